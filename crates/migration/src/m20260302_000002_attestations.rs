use sea_orm_migration::prelude::*;

use crate::m20260302_000001_init::{Events, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attestations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attestations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attestations::EventId).uuid().not_null())
                    .col(ColumnDef::new(Attestations::UserId).uuid().not_null())
                    .col(ColumnDef::new(Attestations::Type).string().not_null())
                    .col(
                        ColumnDef::new(Attestations::GeneratedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Attestations::FilePath).text().not_null())
                    .col(
                        ColumnDef::new(Attestations::UniqueCode)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("attestations_event_fk")
                            .from(Attestations::Table, Attestations::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("attestations_user_fk")
                            .from(Attestations::Table, Attestations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("attestations_user_idx")
                    .table(Attestations::Table)
                    .col(Attestations::UserId)
                    .col(Attestations::GeneratedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attestations::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
pub(crate) enum Attestations {
    Table,
    Id,
    EventId,
    UserId,
    Type,
    GeneratedAt,
    FilePath,
    UniqueCode,
}
