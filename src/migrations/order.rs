use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m0003_orders"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).string_len(26).not_null().primary_key())
                    .col(ColumnDef::new(Orders::CustomerId).string_len(26).not_null())
                    .col(ColumnDef::new(Orders::ProductId).string_len(26).not_null())
                    .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                    .col(ColumnDef::new(Orders::Status).string().not_null())
                    .col(ColumnDef::new(Orders::CreateAt).big_integer().not_null())
                    .col(ColumnDef::new(Orders::UpdateAt).big_integer().not_null())
                    .col(ColumnDef::new(Orders::DeleteAt).big_integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-orders-product_id")
                            .from(Orders::Table, Orders::ProductId)
                            .to(super::product::Products::Table, super::product::Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-customer_id-create_at")
                    .table(Orders::Table)
                    .col(Orders::CustomerId)
                    .col(Orders::CreateAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-update_at")
                    .table(Orders::Table)
                    .col(Orders::UpdateAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Orders {
    Table,
    Id,
    CustomerId,
    ProductId,
    Quantity,
    Status,
    CreateAt,
    UpdateAt,
    DeleteAt,
}
