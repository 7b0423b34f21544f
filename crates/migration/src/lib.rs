use sea_orm_migration::prelude::*;

mod m20260302_000001_init;
mod m20260302_000002_attestations;
mod m20260415_000003_attestation_unique_key;
mod m20261017_000004_email_verification;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260302_000001_init::Migration),
            Box::new(m20260302_000002_attestations::Migration),
            Box::new(m20260415_000003_attestation_unique_key::Migration),
            Box::new(m20261017_000004_email_verification::Migration),
        ]
    }
}
