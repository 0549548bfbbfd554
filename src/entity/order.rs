use sea_orm::entity::prelude::*;
use sea_orm::DeriveActiveEnum;
use sea_orm::EnumIter;
use serde::Deserialize;
use serde::Serialize;

use super::check_id;
use super::store_entity_basics;
use super::StoreEntity;
use crate::error::StoreError;
use crate::error::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_status")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "New")]
    New,
    #[sea_orm(string_value = "Backordered")]
    Backordered,
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Refunded")]
    Refunded,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:          String,
    #[sea_orm(indexed)]
    pub customer_id: String,
    pub product_id:  String,
    pub quantity:    i32,
    pub status:      OrderStatus,
    pub create_at:   i64,
    pub update_at:   i64,
    #[serde(default)]
    pub delete_at:   i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(customer_id: impl Into<String>, product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            id:          String::new(),
            customer_id: customer_id.into(),
            product_id:  product_id.into(),
            quantity,
            status:      OrderStatus::New,
            create_at:   0,
            update_at:   0,
            delete_at:   0,
        }
    }
}

impl StoreEntity for Model {
    const ENTITY: &'static str = "order";
    const PLURAL: &'static str = "orders";

    store_entity_basics!(soft_delete);

    fn is_valid(&self) -> StoreResult<()> {
        if self.customer_id.is_empty() {
            return Err(StoreError::validation(Self::ENTITY, "customer_id is required"));
        }
        check_id(Self::ENTITY, &self.product_id)?;
        if self.quantity <= 0 {
            return Err(StoreError::validation(
                Self::ENTITY,
                format!("quantity must be positive, got {}", self.quantity),
            ));
        }
        Ok(())
    }
}
