use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use super::check_id;
use super::check_len;
use super::store_entity_basics;
use super::StoreEntity;
use crate::error::StoreResult;

/// A node of a category tree encoded as a nested set.
///
/// `lft`/`rgt` are maintained exclusively by the tree procedure. A node's subtree is the set of nodes whose `lft` lies
/// strictly between the node's own `lft` and `rgt`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:        String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name:      String,
    #[sea_orm(indexed)]
    pub lft:       i64,
    #[sea_orm(indexed)]
    pub rgt:       i64,
    pub depth:     i32,
    pub create_at: i64,
    pub update_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Number of descendants, computed from the interval width alone.
    pub fn descendant_count(&self) -> i64 {
        (self.rgt - self.lft - 1) / 2
    }

    pub fn is_ancestor_of(&self, other: &Model) -> bool {
        self.lft < other.lft && other.rgt < self.rgt
    }
}

impl StoreEntity for Model {
    const ENTITY: &'static str = "category";
    const PLURAL: &'static str = "categories";

    store_entity_basics!();

    fn is_valid(&self) -> StoreResult<()> {
        check_len(Self::ENTITY, "name", &self.name, 1, 64)?;
        if let Some(ref parent_id) = self.parent_id {
            check_id(Self::ENTITY, parent_id)?;
        }
        Ok(())
    }
}
