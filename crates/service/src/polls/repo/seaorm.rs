use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set, SqlErr, TransactionTrait,
};

use models::{choice, question, user, vote};
use tracing::debug;

use crate::errors::{FieldErrors, ServiceError};
use crate::pagination::{Paged, Pagination};
use crate::polls::domain::{Choice, NewQuestion, NewVote, Question, Vote, VoteChange};
use crate::polls::repository::{PollRepository, MSG_MULTIPLE_VOTING, MSG_QUESTION_TEXT_TAKEN};

pub struct SeaOrmPollRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmPollRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

#[derive(Debug, FromQueryResult)]
struct ChoiceWithVotes {
    id: i32,
    question_id: i32,
    choice_text: String,
    vote_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct VoteWithVoter {
    id: i32,
    voter_id: i32,
    choice_id: i32,
    hide_voter: bool,
    voter_username: String,
}

fn to_question(q: question::Model) -> Question {
    Question {
        id: q.id,
        author_id: q.author_id,
        question_text: q.question_text,
        date_published: q.date_published.with_timezone(&Utc),
        date_created: q.date_created.with_timezone(&Utc),
    }
}

impl From<ChoiceWithVotes> for Choice {
    fn from(c: ChoiceWithVotes) -> Self {
        Choice { id: c.id, question_id: c.question_id, choice_text: c.choice_text, vote_count: c.vote_count }
    }
}

impl From<VoteWithVoter> for Vote {
    fn from(v: VoteWithVoter) -> Self {
        Vote {
            id: v.id,
            voter_id: v.voter_id,
            voter_username: v.voter_username,
            choice_id: v.choice_id,
            hide_voter: v.hide_voter,
        }
    }
}

fn unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Questions whose publication date has passed and that own at least one choice.
fn published(now: DateTime<Utc>) -> Select<question::Entity> {
    question::Entity::find()
        .filter(question::Column::DatePublished.lte(now.fixed_offset()))
        .filter(
            question::Column::Id.in_subquery(
                Query::select()
                    .column(choice::Column::QuestionId)
                    .from(choice::Entity)
                    .to_owned(),
            ),
        )
}

fn choices_with_votes() -> Select<choice::Entity> {
    choice::Entity::find()
        .column_as(Expr::col((vote::Entity, vote::Column::Id)).count(), "vote_count")
        .join_rev(JoinType::LeftJoin, vote::Relation::Choice.def())
        .group_by(choice::Column::Id)
        .group_by(choice::Column::QuestionId)
        .group_by(choice::Column::ChoiceText)
}

fn votes_with_voter() -> Select<vote::Entity> {
    vote::Entity::find()
        .column_as(user::Column::Username, "voter_username")
        .join(JoinType::InnerJoin, vote::Relation::Voter.def())
}

impl SeaOrmPollRepository {
    async fn vote_by_id(&self, id: i32) -> Result<Option<Vote>, ServiceError> {
        let row = votes_with_voter()
            .filter(vote::Column::Id.eq(id))
            .into_model::<VoteWithVoter>()
            .one(&self.db)
            .await?;
        Ok(row.map(Vote::from))
    }
}

#[async_trait::async_trait]
impl PollRepository for SeaOrmPollRepository {
    async fn list_published_questions(&self, now: DateTime<Utc>, page: Pagination) -> Result<Paged<Question>, ServiceError> {
        let count = published(now).count(&self.db).await?;
        let rows = published(now)
            .order_by_desc(question::Column::DatePublished)
            .order_by_desc(question::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .all(&self.db)
            .await?;
        Ok(Paged { count, items: rows.into_iter().map(to_question).collect() })
    }

    async fn find_published_question(&self, id: i32, now: DateTime<Utc>) -> Result<Option<Question>, ServiceError> {
        let row = published(now).filter(question::Column::Id.eq(id)).one(&self.db).await?;
        Ok(row.map(to_question))
    }

    async fn question_text_exists(&self, text: &str) -> Result<bool, ServiceError> {
        let n = question::Entity::find()
            .filter(question::Column::QuestionText.eq(text))
            .count(&self.db)
            .await?;
        Ok(n > 0)
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, ServiceError> {
        let txn = self.db.begin().await?;
        let inserted = question::ActiveModel {
            author_id: Set(new.author_id),
            question_text: Set(new.question_text),
            date_published: Set(new.date_published.fixed_offset()),
            date_created: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                ServiceError::Validation(FieldErrors::single("question_text", MSG_QUESTION_TEXT_TAKEN))
            } else {
                ServiceError::from(e)
            }
        })?;
        let rows = new.choices.into_iter().map(|text| choice::ActiveModel {
            question_id: Set(inserted.id),
            choice_text: Set(text),
            ..Default::default()
        });
        choice::Entity::insert_many(rows).exec(&txn).await?;
        txn.commit().await?;
        Ok(to_question(inserted))
    }

    async fn delete_question(&self, id: i32) -> Result<(), ServiceError> {
        question::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn list_choices(&self, question_id: i32, page: Pagination) -> Result<Paged<Choice>, ServiceError> {
        let count = choice::Entity::find()
            .filter(choice::Column::QuestionId.eq(question_id))
            .count(&self.db)
            .await?;
        let rows = choices_with_votes()
            .filter(choice::Column::QuestionId.eq(question_id))
            .order_by_asc(choice::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .into_model::<ChoiceWithVotes>()
            .all(&self.db)
            .await?;
        Ok(Paged { count, items: rows.into_iter().map(Choice::from).collect() })
    }

    async fn find_choice(&self, id: i32) -> Result<Option<Choice>, ServiceError> {
        let row = choices_with_votes()
            .filter(choice::Column::Id.eq(id))
            .into_model::<ChoiceWithVotes>()
            .one(&self.db)
            .await?;
        Ok(row.map(Choice::from))
    }

    async fn list_votes(&self, choice_id: i32, page: Pagination) -> Result<Paged<Vote>, ServiceError> {
        let count = vote::Entity::find()
            .filter(vote::Column::ChoiceId.eq(choice_id))
            .count(&self.db)
            .await?;
        let rows = votes_with_voter()
            .filter(vote::Column::ChoiceId.eq(choice_id))
            .order_by_asc(vote::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .into_model::<VoteWithVoter>()
            .all(&self.db)
            .await?;
        Ok(Paged { count, items: rows.into_iter().map(Vote::from).collect() })
    }

    async fn find_vote(&self, id: i32) -> Result<Option<Vote>, ServiceError> {
        self.vote_by_id(id).await
    }

    async fn create_vote(&self, new: NewVote) -> Result<Vote, ServiceError> {
        let txn = self.db.begin().await?;
        // row lock on the question serializes concurrent votes on it
        question::Entity::find_by_id(new.question_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("question"))?;
        let held = vote::Entity::find()
            .join(JoinType::InnerJoin, vote::Relation::Choice.def())
            .filter(choice::Column::QuestionId.eq(new.question_id))
            .filter(vote::Column::VoterId.eq(new.voter_id))
            .count(&txn)
            .await?;
        if held > 0 {
            debug!(question_id = new.question_id, "duplicate vote rejected");
            return Err(FieldErrors::non_field(MSG_MULTIPLE_VOTING).into());
        }
        let inserted = vote::ActiveModel {
            voter_id: Set(new.voter_id),
            choice_id: Set(new.choice_id),
            hide_voter: Set(new.hide_voter),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                ServiceError::Validation(FieldErrors::non_field(MSG_MULTIPLE_VOTING))
            } else {
                ServiceError::from(e)
            }
        })?;
        txn.commit().await?;
        self.vote_by_id(inserted.id).await?.ok_or_else(|| ServiceError::not_found("vote"))
    }

    async fn update_vote(&self, id: i32, change: VoteChange) -> Result<Vote, ServiceError> {
        let found = vote::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("vote"))?;
        let mut am: vote::ActiveModel = found.into();
        if let Some(c) = change.choice_id {
            am.choice_id = Set(c);
        }
        if let Some(h) = change.hide_voter {
            am.hide_voter = Set(h);
        }
        am.update(&self.db).await.map_err(|e| {
            if unique_violation(&e) {
                ServiceError::Validation(FieldErrors::non_field(MSG_MULTIPLE_VOTING))
            } else {
                ServiceError::from(e)
            }
        })?;
        self.vote_by_id(id).await?.ok_or_else(|| ServiceError::not_found("vote"))
    }

    async fn delete_vote(&self, id: i32) -> Result<(), ServiceError> {
        vote::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }
}
