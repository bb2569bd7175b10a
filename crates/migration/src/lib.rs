//! Migrator registering entity-specific migrations in dependency order.
//! Indexes are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_user;
mod m20240101_000002_create_user_credentials;
mod m20240101_000003_create_auth_token;
mod m20240101_000004_create_user_session;
mod m20240101_000005_create_question;
mod m20240101_000006_create_choice;
mod m20240101_000007_create_vote;
mod m20240101_000008_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_user::Migration),
            Box::new(m20240101_000002_create_user_credentials::Migration),
            Box::new(m20240101_000003_create_auth_token::Migration),
            Box::new(m20240101_000004_create_user_session::Migration),
            Box::new(m20240101_000005_create_question::Migration),
            Box::new(m20240101_000006_create_choice::Migration),
            Box::new(m20240101_000007_create_vote::Migration),
            // Indexes should always be applied last
            Box::new(m20240101_000008_add_indexes::Migration),
        ]
    }
}
