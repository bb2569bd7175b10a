use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // User: email unique when set, case-insensitive
        manager
            .get_connection()
            .execute_unprepared(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "uniq_user_email" ON "user" (lower("email")) WHERE "email" <> ''"#,
            )
            .await?;

        // Session: lookups by owner on logout and password change
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_session_user")
                    .table(UserSession::Table)
                    .col(UserSession::UserId)
                    .to_owned(),
            )
            .await?;

        // Question: list ordering
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_question_date_published")
                    .table(Question::Table)
                    .col(Question::DatePublished)
                    .to_owned(),
            )
            .await?;

        // Choice: composite unique (question_id, choice_text)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_choice_question_text")
                    .table(Choice::Table)
                    .col(Choice::QuestionId)
                    .col(Choice::ChoiceText)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Vote: composite unique (voter_id, choice_id) and count lookups by choice
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_vote_voter_choice")
                    .table(Vote::Table)
                    .col(Vote::VoterId)
                    .col(Vote::ChoiceId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_vote_choice")
                    .table(Vote::Table)
                    .col(Vote::ChoiceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_index(Index::drop().name("idx_vote_choice").table(Vote::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("uniq_vote_voter_choice").table(Vote::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("uniq_choice_question_text").table(Choice::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("idx_question_date_published").table(Question::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("idx_user_session_user").table(UserSession::Table).to_owned()).await?;
        manager
            .get_connection()
            .execute_unprepared(r#"DROP INDEX IF EXISTS "uniq_user_email""#)
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserSession { Table, UserId }

#[derive(DeriveIden)]
enum Question { Table, DatePublished }

#[derive(DeriveIden)]
enum Choice { Table, QuestionId, ChoiceText }

#[derive(DeriveIden)]
enum Vote { Table, VoterId, ChoiceId }
