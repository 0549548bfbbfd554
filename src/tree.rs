//! Nested-set category trees.
//!
//! Every node stores a `[lft, rgt]` interval. A node's descendants are exactly the nodes whose intervals lie inside
//! its own, so subtree and path queries are plain range comparisons. The price is paid on writes: inserting, moving
//! or deleting a node renumbers every interval to its right. Those renumberings are only ever performed as a whole by
//! a [`TreeProcedure`].
use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::entity::Category;
use crate::error::StoreResult;

/// A structural change to a category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeMutation {
    /// Add a leaf as the last child of `parent_id`, or as the last root.
    Insert {
        id:        String,
        parent_id: Option<String>,
        name:      String,
        create_at: i64,
        update_at: i64,
    },
    /// Remove a node together with its whole subtree.
    Delete { id: String },
    /// Re-attach a node, with its subtree, as the last child of `parent_id` or as the last root.
    Move {
        id:        String,
        parent_id: Option<String>,
        update_at: i64,
    },
    /// Move a node to index `position` among its siblings. Positions past the end mean "last".
    Order { id: String, position: u32, update_at: i64 },
    Rename { id: String, name: String, update_at: i64 },
}

impl TreeMutation {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "category.insert",
            Self::Delete { .. } => "category.delete",
            Self::Move { .. } => "category.move",
            Self::Order { .. } => "category.order",
            Self::Rename { .. } => "category.rename",
        }
    }

    /// The node the mutation is about.
    pub fn id(&self) -> &str {
        match self {
            Self::Insert { id, .. }
            | Self::Delete { id }
            | Self::Move { id, .. }
            | Self::Order { id, .. }
            | Self::Rename { id, .. } => id,
        }
    }
}

/// The atomic renumbering procedure. An implementation must apply a mutation entirely or not at all, and must not let
/// two mutations interleave.
#[async_trait]
pub trait TreeProcedure: Debug + Send + Sync + 'static {
    async fn apply(&self, mutation: TreeMutation) -> StoreResult<()>;
}

/// Check that `nodes` form a well-formed forest of nested sets.
///
/// Intervals must tile `1..=2n` without gaps or overlaps, every node must sit inside its parent's interval as its
/// nearest enclosing one, and depth must grow by exactly one per level.
pub fn verify_nested_set(nodes: &[Category]) -> Result<(), String> {
    let mut sorted: Vec<&Category> = nodes.iter().collect();
    sorted.sort_by_key(|n| n.lft);

    let mut bounds: Vec<i64> = nodes.iter().flat_map(|n| [n.lft, n.rgt]).collect();
    bounds.sort_unstable();
    if bounds.iter().copied().ne(1..=(2 * nodes.len() as i64)) {
        return Err(format!("bounds are not a permutation of 1..={}: {bounds:?}", 2 * nodes.len()));
    }

    let by_id: HashMap<&str, &Category> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    // Ancestors of the current node, innermost last.
    let mut stack: Vec<&Category> = Vec::new();

    for node in sorted {
        if node.lft >= node.rgt || (node.rgt - node.lft) % 2 == 0 {
            return Err(format!("'{}' has a malformed interval [{}, {}]", node.id, node.lft, node.rgt));
        }
        while stack.last().is_some_and(|top| top.rgt < node.lft) {
            stack.pop();
        }
        let enclosing = stack.last().copied();
        if let Some(parent) = enclosing {
            if node.rgt > parent.rgt {
                return Err(format!("'{}' overlaps '{}'", node.id, parent.id));
            }
        }

        let expected_parent = enclosing.map(|p| p.id.as_str());
        if node.parent_id.as_deref() != expected_parent {
            return Err(format!(
                "'{}' has parent {:?} but sits inside {:?}",
                node.id, node.parent_id, expected_parent
            ));
        }
        if let Some(parent_id) = node.parent_id.as_deref() {
            if !by_id.contains_key(parent_id) {
                return Err(format!("'{}' refers to a missing parent '{parent_id}'", node.id));
            }
        }

        let expected_depth = enclosing.map_or(0, |p| p.depth + 1);
        if node.depth != expected_depth {
            return Err(format!("'{}' has depth {} instead of {expected_depth}", node.id, node.depth));
        }
        stack.push(node);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, lft: i64, rgt: i64, depth: i32) -> Category {
        Category {
            id: id.into(),
            parent_id: parent.map(Into::into),
            name: id.into(),
            lft,
            rgt,
            depth,
            create_at: 1,
            update_at: 1,
        }
    }

    #[test]
    fn accepts_a_forest() {
        let nodes = vec![
            node("a", None, 1, 6, 0),
            node("b", Some("a"), 2, 3, 1),
            node("c", Some("a"), 4, 5, 1),
            node("d", None, 7, 8, 0),
        ];
        verify_nested_set(&nodes).unwrap();
        assert_eq!(nodes[0].descendant_count(), 2);
        assert!(nodes[0].is_ancestor_of(&nodes[2]));
        assert!(!nodes[1].is_ancestor_of(&nodes[2]));
    }

    #[test]
    fn rejects_gaps_wrong_parents_and_depths() {
        assert!(verify_nested_set(&[node("a", None, 1, 4, 0)]).is_err());
        assert!(verify_nested_set(&[node("a", None, 1, 4, 0), node("b", None, 2, 3, 1)]).is_err());
        assert!(verify_nested_set(&[node("a", None, 1, 4, 0), node("b", Some("a"), 2, 3, 2)]).is_err());
        assert!(verify_nested_set(&[node("a", None, 1, 3, 0), node("b", Some("a"), 2, 4, 1)]).is_err());
    }

    #[test]
    fn mutation_ids() {
        let m = TreeMutation::Order {
            id:        "x".into(),
            position:  0,
            update_at: 1,
        };
        assert_eq!(m.id(), "x");
        assert_eq!(m.op(), "category.order");
    }
}
