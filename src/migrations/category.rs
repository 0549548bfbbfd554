use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m0001_categories"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Categories::Id).string_len(26).not_null().primary_key())
                    .col(ColumnDef::new(Categories::ParentId).string_len(26).null())
                    .col(ColumnDef::new(Categories::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Categories::Lft).big_integer().not_null())
                    .col(ColumnDef::new(Categories::Rgt).big_integer().not_null())
                    .col(ColumnDef::new(Categories::Depth).integer().not_null())
                    .col(ColumnDef::new(Categories::CreateAt).big_integer().not_null())
                    .col(ColumnDef::new(Categories::UpdateAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Subtree and path lookups are interval scans over (lft, rgt).
        manager
            .create_index(
                Index::create()
                    .name("idx-categories-lft-rgt")
                    .table(Categories::Table)
                    .col(Categories::Lft)
                    .col(Categories::Rgt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-parent_id")
                    .table(Categories::Table)
                    .col(Categories::ParentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Categories::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Categories {
    Table,
    Id,
    ParentId,
    Name,
    Lft,
    Rgt,
    Depth,
    CreateAt,
    UpdateAt,
}
