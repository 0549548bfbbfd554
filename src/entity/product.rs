use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use super::check_len;
use super::store_entity_basics;
use super::StoreEntity;
use crate::error::StoreError;
use crate::error::StoreResult;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:          String,
    pub name:        String,
    pub price:       f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub create_at:   i64,
    pub update_at:   i64,
    #[serde(default)]
    pub delete_at:   i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A product that has not been saved yet.
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            id:          String::new(),
            name:        name.into(),
            price,
            category_id: None,
            create_at:   0,
            update_at:   0,
            delete_at:   0,
        }
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

impl StoreEntity for Model {
    const ENTITY: &'static str = "product";
    const PLURAL: &'static str = "products";

    store_entity_basics!(soft_delete);

    fn is_valid(&self) -> StoreResult<()> {
        check_len(Self::ENTITY, "name", &self.name, 1, 64)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(StoreError::validation(Self::ENTITY, format!("bad price {}", self.price)));
        }
        if let Some(ref category_id) = self.category_id {
            super::check_id(Self::ENTITY, category_id)?;
        }
        Ok(())
    }
}
