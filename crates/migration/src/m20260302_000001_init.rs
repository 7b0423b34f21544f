use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::FirstName).text().not_null())
                    .col(ColumnDef::new(Users::LastName).text().not_null())
                    .col(ColumnDef::new(Users::Email).text().not_null().unique_key())
                    .col(ColumnDef::new(Users::Institution).text().null())
                    .col(ColumnDef::new(Users::Country).text().null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string()
                            .not_null()
                            .default("participant"),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Events::Title).text().not_null())
                    .col(ColumnDef::new(Events::Location).text().null())
                    .col(ColumnDef::new(Events::StartDate).date().not_null())
                    .col(ColumnDef::new(Events::EndDate).date().null())
                    .col(ColumnDef::new(Events::EndTime).time().null())
                    .col(ColumnDef::new(Events::OrganizerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("events_organizer_fk")
                            .from(Events::Table, Events::OrganizerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Registrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Registrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Registrations::EventId).uuid().not_null())
                    .col(ColumnDef::new(Registrations::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Registrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("registrations_event_fk")
                            .from(Registrations::Table, Registrations::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("registrations_user_fk")
                            .from(Registrations::Table, Registrations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("registrations_event_user_idx")
                    .table(Registrations::Table)
                    .col(Registrations::EventId)
                    .col(Registrations::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sessions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sessions::EventId).uuid().not_null())
                    .col(ColumnDef::new(Sessions::Title).text().not_null())
                    .col(ColumnDef::new(Sessions::ChairId).uuid().null())
                    .col(
                        ColumnDef::new(Sessions::StartsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("sessions_event_fk")
                            .from(Sessions::Table, Sessions::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("sessions_chair_fk")
                            .from(Sessions::Table, Sessions::ChairId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Submissions::EventId).uuid().not_null())
                    .col(ColumnDef::new(Submissions::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Submissions::PresenterId).uuid().null())
                    .col(ColumnDef::new(Submissions::SessionId).uuid().null())
                    .col(ColumnDef::new(Submissions::Title).text().not_null())
                    .col(
                        ColumnDef::new(Submissions::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Submissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("submissions_event_fk")
                            .from(Submissions::Table, Submissions::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("submissions_session_fk")
                            .from(Submissions::Table, Submissions::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("submissions_event_status_idx")
                    .table(Submissions::Table)
                    .col(Submissions::EventId)
                    .col(Submissions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScientificCommittees::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScientificCommittees::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScientificCommittees::EventId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScientificCommittees::Name).text().not_null())
                    .col(
                        ColumnDef::new(ScientificCommittees::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("scientific_committees_event_fk")
                            .from(ScientificCommittees::Table, ScientificCommittees::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CommitteeMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommitteeMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CommitteeMembers::CommitteeId).uuid().not_null())
                    .col(ColumnDef::new(CommitteeMembers::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CommitteeMembers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("committee_members_committee_fk")
                            .from(CommitteeMembers::Table, CommitteeMembers::CommitteeId)
                            .to(ScientificCommittees::Table, ScientificCommittees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("committee_members_user_fk")
                            .from(CommitteeMembers::Table, CommitteeMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommitteeMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScientificCommittees::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Submissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Registrations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    Institution,
    Country,
    Role,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum Events {
    Table,
    Id,
    Title,
    Location,
    StartDate,
    EndDate,
    EndTime,
    OrganizerId,
    CreatedAt,
}

#[derive(Iden)]
enum Registrations {
    Table,
    Id,
    EventId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    Id,
    EventId,
    Title,
    ChairId,
    StartsAt,
    CreatedAt,
}

#[derive(Iden)]
enum Submissions {
    Table,
    Id,
    EventId,
    AuthorId,
    PresenterId,
    SessionId,
    Title,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum ScientificCommittees {
    Table,
    Id,
    EventId,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum CommitteeMembers {
    Table,
    Id,
    CommitteeId,
    UserId,
    CreatedAt,
}
