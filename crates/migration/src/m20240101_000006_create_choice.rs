//! Create `choice` table; rows cascade with their question.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Choice::Table)
                    .if_not_exists()
                    .col(pk_auto(Choice::Id))
                    .col(integer(Choice::QuestionId).not_null())
                    .col(string_len(Choice::ChoiceText, 200).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_choice_question")
                            .from(Choice::Table, Choice::QuestionId)
                            .to(Question::Table, Question::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Choice::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Choice { Table, Id, QuestionId, ChoiceText }

#[derive(DeriveIden)]
enum Question { Table, Id }
