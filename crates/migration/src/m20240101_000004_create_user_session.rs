//! Create `user_session` table backing the `sessionid` cookie.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserSession::Table)
                    .if_not_exists()
                    .col(string_len(UserSession::SessionKey, 40).primary_key())
                    .col(integer(UserSession::UserId).not_null())
                    .col(timestamp_with_time_zone(UserSession::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(UserSession::ExpiresAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_session_user")
                            .from(UserSession::Table, UserSession::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserSession::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum UserSession { Table, SessionKey, UserId, CreatedAt, ExpiresAt }

#[derive(DeriveIden)]
enum User { Table, Id }
