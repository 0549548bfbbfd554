//! Category trees on top of a relational table.
//!
//! Reads are interval comparisons. Writes go through [`SqlTreeProcedure`], which performs each renumbering inside a
//! single transaction while holding a lock shared by every clone of the procedure.
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::ColumnTrait;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::DatabaseTransaction;
use sea_orm::EntityTrait;
use sea_orm::QueryFilter;
use sea_orm::QueryOrder;
use sea_orm::TransactionTrait;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::entity::category;
use crate::entity::category::Column;
use crate::entity::is_valid_id;
use crate::entity::Categories;
use crate::entity::Category;
use crate::entity::StoreEntity;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::supplier::Hints;
use crate::tree::TreeMutation;
use crate::tree::TreeProcedure;

use super::pagination::Listable;

impl Listable for Categories {
    fn id_column() -> Column {
        Column::Id
    }

    fn create_at_column() -> Column {
        Column::CreateAt
    }

    fn update_at_column() -> Column {
        Column::UpdateAt
    }

    fn delete_at_column() -> Option<Column> {
        None
    }
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: &str) -> StoreResult<Category> {
    super::fetch::<Categories, C>(conn, id, &Hints::default()).await
}

/// The requested nodes that exist, in tree order.
pub async fn get_by_ids<C: ConnectionTrait>(conn: &C, ids: &[String]) -> StoreResult<EntityList<Category>> {
    if ids.is_empty() {
        return Ok(EntityList::new());
    }
    let rows = Categories::find()
        .filter(Column::Id.is_in(ids.iter().cloned()))
        .order_by_asc(Column::Lft)
        .all(conn)
        .await?;
    Ok(EntityList::from_ordered(rows))
}

/// Every node below `id`, in tree order. The node itself is not included.
pub async fn descendants<C: ConnectionTrait>(conn: &C, id: &str) -> StoreResult<EntityList<Category>> {
    let node = get(conn, id).await?;
    let rows = Categories::find()
        .filter(Column::Lft.gt(node.lft))
        .filter(Column::Lft.lt(node.rgt))
        .order_by_asc(Column::Lft)
        .all(conn)
        .await?;
    Ok(EntityList::from_ordered(rows))
}

/// The chain of nodes from the root down to `id`, both ends included.
pub async fn path<C: ConnectionTrait>(conn: &C, id: &str) -> StoreResult<EntityList<Category>> {
    let node = get(conn, id).await?;
    let rows = Categories::find()
        .filter(Column::Lft.lte(node.lft))
        .filter(Column::Rgt.gte(node.rgt))
        .order_by_asc(Column::Lft)
        .all(conn)
        .await?;
    Ok(EntityList::from_ordered(rows))
}

pub async fn roots<C: ConnectionTrait>(conn: &C) -> StoreResult<EntityList<Category>> {
    let rows = Categories::find()
        .filter(Column::ParentId.is_null())
        .order_by_asc(Column::Lft)
        .all(conn)
        .await?;
    Ok(EntityList::from_ordered(rows))
}

/// Every node of every tree, in tree order.
pub async fn all<C: ConnectionTrait>(conn: &C) -> StoreResult<Vec<Category>> {
    Ok(Categories::find().order_by_asc(Column::Lft).all(conn).await?)
}

#[derive(Debug, Clone)]
pub struct SqlTreeProcedure {
    conn: DatabaseConnection,
    // Serializes the mutations issued through this procedure and its clones.
    lock: Arc<Mutex<()>>,
}

impl SqlTreeProcedure {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn insert(
        txn: &DatabaseTransaction,
        id: String,
        parent_id: Option<String>,
        name: String,
        create_at: i64,
        update_at: i64,
    ) -> StoreResult<()> {
        if !is_valid_id(&id) {
            return Err(StoreError::validation(Category::ENTITY, format!("malformed id '{id}'")));
        }

        let (lft, depth) = match parent_id {
            Some(ref parent_id) => {
                let parent = load(txn, parent_id).await?;
                shift(txn, parent.rgt, 2).await?;
                (parent.rgt, parent.depth + 1)
            }
            None => (max_rgt(txn).await? + 1, 0),
        };

        let node = Category {
            id,
            parent_id,
            name,
            lft,
            rgt: lft + 1,
            depth,
            create_at,
            update_at: update_at.max(create_at),
        };
        node.is_valid()?;

        Categories::insert(category::ActiveModel {
            id:        Set(node.id.clone()),
            parent_id: Set(node.parent_id.clone()),
            name:      Set(node.name.clone()),
            lft:       Set(node.lft),
            rgt:       Set(node.rgt),
            depth:     Set(node.depth),
            create_at: Set(node.create_at),
            update_at: Set(node.update_at),
        })
        .exec_without_returning(txn)
        .await
        .map_err(|err| StoreError::from(err).or_conflict(Category::ENTITY, &node.id))?;

        Ok(())
    }

    async fn delete(txn: &DatabaseTransaction, id: &str) -> StoreResult<()> {
        let node = load(txn, id).await?;
        Categories::delete_many()
            .filter(Column::Lft.gte(node.lft))
            .filter(Column::Rgt.lte(node.rgt))
            .exec(txn)
            .await?;
        shift(txn, node.rgt + 1, -width(&node)).await
    }

    async fn move_to(txn: &DatabaseTransaction, id: &str, parent_id: Option<String>, update_at: i64) -> StoreResult<()> {
        let node = load(txn, id).await?;
        let parent = match parent_id {
            Some(ref parent_id) => {
                let parent = load(txn, parent_id).await?;
                if parent.lft >= node.lft && parent.rgt <= node.rgt {
                    return Err(StoreError::validation(
                        Category::ENTITY,
                        format!("cannot move '{id}' under itself or one of its descendants"),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        detach(txn, &node).await?;
        let w = width(&node);
        let (target, depth) = match parent {
            Some(ref parent) => (after_close(parent.rgt, &node), parent.depth + 1),
            None => (max_rgt(txn).await? + 1, 0),
        };
        attach(txn, &node, target, depth).await?;

        Categories::update_many()
            .col_expr(Column::ParentId, Expr::value(parent_id))
            .col_expr(Column::UpdateAt, Expr::value(update_at.max(node.update_at)))
            .filter(Column::Id.eq(id))
            .exec(txn)
            .await?;

        tracing::trace!("moved '{id}' ({w} slots) to {target}");
        Ok(())
    }

    async fn order(txn: &DatabaseTransaction, id: &str, position: u32, update_at: i64) -> StoreResult<()> {
        let node = load(txn, id).await?;
        let siblings_of = match node.parent_id {
            Some(ref parent_id) => Column::ParentId.eq(parent_id.as_str()),
            None => Column::ParentId.is_null(),
        };
        let siblings = Categories::find()
            .filter(siblings_of)
            .filter(Column::Id.ne(id))
            .order_by_asc(Column::Lft)
            .all(txn)
            .await?;
        let position = (position as usize).min(siblings.len());

        // Where the node will start, expressed in coordinates from before the move.
        let anchor = match siblings.get(position) {
            Some(sibling) => Anchor::Before(sibling.lft),
            None => match node.parent_id {
                Some(ref parent_id) => Anchor::Before(load(txn, parent_id).await?.rgt),
                None => Anchor::End,
            },
        };

        detach(txn, &node).await?;
        let target = match anchor {
            Anchor::Before(at) => after_close(at, &node),
            Anchor::End => max_rgt(txn).await? + 1,
        };
        attach(txn, &node, target, node.depth).await?;

        Categories::update_many()
            .col_expr(Column::UpdateAt, Expr::value(update_at.max(node.update_at)))
            .filter(Column::Id.eq(id))
            .exec(txn)
            .await?;
        Ok(())
    }

    async fn rename(txn: &DatabaseTransaction, id: &str, name: String, update_at: i64) -> StoreResult<()> {
        let mut node = load(txn, id).await?;
        node.name = name;
        node.is_valid()?;
        Categories::update_many()
            .col_expr(Column::Name, Expr::value(node.name))
            .col_expr(Column::UpdateAt, Expr::value(update_at.max(node.update_at)))
            .filter(Column::Id.eq(id))
            .exec(txn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TreeProcedure for SqlTreeProcedure {
    #[instrument(level = "debug", skip(self, mutation), fields(op = mutation.op(), id = mutation.id()))]
    async fn apply(&self, mutation: TreeMutation) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let txn = self.conn.begin().await?;

        // Dropping the transaction on error rolls it back.
        match mutation {
            TreeMutation::Insert {
                id,
                parent_id,
                name,
                create_at,
                update_at,
            } => Self::insert(&txn, id, parent_id, name, create_at, update_at).await?,
            TreeMutation::Delete { id } => Self::delete(&txn, &id).await?,
            TreeMutation::Move {
                id,
                parent_id,
                update_at,
            } => Self::move_to(&txn, &id, parent_id, update_at).await?,
            TreeMutation::Order {
                id,
                position,
                update_at,
            } => Self::order(&txn, &id, position, update_at).await?,
            TreeMutation::Rename { id, name, update_at } => Self::rename(&txn, &id, name, update_at).await?,
        }

        txn.commit().await?;
        Ok(())
    }
}

enum Anchor {
    Before(i64),
    End,
}

fn width(node: &Category) -> i64 {
    node.rgt - node.lft + 1
}

// A position recorded before `node` was detached, translated to after its gap was closed.
fn after_close(at: i64, node: &Category) -> i64 {
    if at > node.rgt {
        at - width(node)
    }
    else {
        at
    }
}

async fn load(txn: &DatabaseTransaction, id: &str) -> StoreResult<Category> {
    Categories::find_by_id(id.to_string())
        .one(txn)
        .await?
        .ok_or_else(|| StoreError::not_found(Category::ENTITY, id))
}

async fn max_rgt(txn: &DatabaseTransaction) -> StoreResult<i64> {
    Ok(Categories::find()
        .order_by_desc(Column::Rgt)
        .one(txn)
        .await?
        .map_or(0, |c| c.rgt.max(0)))
}

// Add `delta` to every bound at or past `from`. Detached (negative) bounds are never touched.
async fn shift(txn: &DatabaseTransaction, from: i64, delta: i64) -> StoreResult<()> {
    Categories::update_many()
        .col_expr(Column::Lft, Expr::col(Column::Lft).add(delta))
        .filter(Column::Lft.gte(from))
        .exec(txn)
        .await?;
    Categories::update_many()
        .col_expr(Column::Rgt, Expr::col(Column::Rgt).add(delta))
        .filter(Column::Rgt.gte(from))
        .exec(txn)
        .await?;
    Ok(())
}

// Park the subtree of `node` at negated bounds and close the gap it leaves.
async fn detach(txn: &DatabaseTransaction, node: &Category) -> StoreResult<()> {
    Categories::update_many()
        .col_expr(Column::Lft, Expr::val(0i64).sub(Expr::col(Column::Lft)))
        .col_expr(Column::Rgt, Expr::val(0i64).sub(Expr::col(Column::Rgt)))
        .filter(Column::Lft.gte(node.lft))
        .filter(Column::Rgt.lte(node.rgt))
        .exec(txn)
        .await?;
    shift(txn, node.rgt + 1, -width(node)).await
}

// Open a gap at `target` and move the parked subtree of `node` into it, with `node` ending up at `depth`.
async fn attach(txn: &DatabaseTransaction, node: &Category, target: i64, depth: i32) -> StoreResult<()> {
    shift(txn, target, width(node)).await?;
    let offset = target - node.lft;
    Categories::update_many()
        .col_expr(Column::Lft, Expr::val(offset).sub(Expr::col(Column::Lft)))
        .col_expr(Column::Rgt, Expr::val(offset).sub(Expr::col(Column::Rgt)))
        .col_expr(Column::Depth, Expr::col(Column::Depth).add(depth - node.depth))
        .filter(Column::Lft.lt(0))
        .exec(txn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_tree_lock() {
        let procedure = SqlTreeProcedure::new(DatabaseConnection::Disconnected);
        let clone = procedure.clone();
        let other = SqlTreeProcedure::new(DatabaseConnection::Disconnected);

        assert!(Arc::ptr_eq(&procedure.lock, &clone.lock));
        assert!(!Arc::ptr_eq(&procedure.lock, &other.lock));
    }

    #[tokio::test]
    async fn separate_procedures_do_not_block_each_other() {
        let procedure = SqlTreeProcedure::new(DatabaseConnection::Disconnected);
        let other = SqlTreeProcedure::new(DatabaseConnection::Disconnected);

        let _held = procedure.lock.lock().await;
        assert!(other.lock.try_lock().is_ok());
        assert!(procedure.clone().lock.try_lock().is_err());
    }
}
