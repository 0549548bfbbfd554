use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m0004_messages"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::Id).string_len(26).not_null().primary_key())
                    .col(ColumnDef::new(Messages::ChannelId).string_len(26).not_null())
                    .col(ColumnDef::new(Messages::UserId).string_len(26).not_null())
                    .col(ColumnDef::new(Messages::RootId).string_len(26).not_null().default(""))
                    .col(ColumnDef::new(Messages::Message).text().not_null())
                    .col(ColumnDef::new(Messages::Props).text().null())
                    .col(ColumnDef::new(Messages::CreateAt).big_integer().not_null())
                    .col(ColumnDef::new(Messages::UpdateAt).big_integer().not_null())
                    .col(ColumnDef::new(Messages::DeleteAt).big_integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-messages-channel_id-create_at")
                    .table(Messages::Table)
                    .col(Messages::ChannelId)
                    .col(Messages::CreateAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-messages-channel_id-update_at")
                    .table(Messages::Table)
                    .col(Messages::ChannelId)
                    .col(Messages::UpdateAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Messages::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Messages {
    Table,
    Id,
    ChannelId,
    UserId,
    RootId,
    Message,
    Props,
    CreateAt,
    UpdateAt,
    DeleteAt,
}
