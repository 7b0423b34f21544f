use sea_orm_migration::prelude::*;

use crate::m20260302_000002_attestations::Attestations;

const INDEX_NAME: &str = "attestations_event_user_type_key";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Keep the most recent row per key so the unique index can be built.
        manager
            .get_connection()
            .execute_unprepared(
                r#"DELETE FROM attestations a
                   USING attestations b
                   WHERE a.event_id = b.event_id
                     AND a.user_id = b.user_id
                     AND a."type" = b."type"
                     AND (a.generated_at, a.id) < (b.generated_at, b.id)"#,
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(INDEX_NAME)
                    .table(Attestations::Table)
                    .col(Attestations::EventId)
                    .col(Attestations::UserId)
                    .col(Attestations::Type)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(INDEX_NAME)
                    .table(Attestations::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
