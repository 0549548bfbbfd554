use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m0002_products"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).string_len(26).not_null().primary_key())
                    .col(ColumnDef::new(Products::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Products::Price).double().not_null())
                    .col(ColumnDef::new(Products::CategoryId).string_len(26).null())
                    .col(ColumnDef::new(Products::CreateAt).big_integer().not_null())
                    .col(ColumnDef::new(Products::UpdateAt).big_integer().not_null())
                    .col(ColumnDef::new(Products::DeleteAt).big_integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-products-update_at")
                    .table(Products::Table)
                    .col(Products::UpdateAt)
                    .col(Products::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-products-create_at")
                    .table(Products::Table)
                    .col(Products::CreateAt)
                    .col(Products::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Products {
    Table,
    Id,
    Name,
    Price,
    CategoryId,
    CreateAt,
    UpdateAt,
    DeleteAt,
}
