//! Schema of the store's tables.
pub mod category;
pub mod message;
pub mod order;
pub mod product;

use sea_orm_migration::prelude::*;

pub struct Migrator;

impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(category::Migration),
            Box::new(product::Migration),
            Box::new(order::Migration),
            Box::new(message::Migration),
        ]
    }
}
