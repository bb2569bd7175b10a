use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Choice, NewQuestion, NewVote, Question, Vote, VoteChange};
use crate::errors::ServiceError;
use crate::pagination::{Paged, Pagination};

pub const MSG_QUESTION_TEXT_TAKEN: &str = "question with this question text already exists.";
pub const MSG_MULTIPLE_VOTING: &str = "Multiple voting detected.";

/// Persistence for questions, choices and votes.
///
/// `now` is passed in so "published" is evaluated against one clock per request.
#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Published questions, newest publication first.
    async fn list_published_questions(&self, now: DateTime<Utc>, page: Pagination) -> Result<Paged<Question>, ServiceError>;
    async fn find_published_question(&self, id: i32, now: DateTime<Utc>) -> Result<Option<Question>, ServiceError>;
    async fn question_text_exists(&self, text: &str) -> Result<bool, ServiceError>;
    /// Inserts the question and its choices atomically.
    async fn create_question(&self, new: NewQuestion) -> Result<Question, ServiceError>;
    /// Deletes the question with its choices and their votes.
    async fn delete_question(&self, id: i32) -> Result<(), ServiceError>;

    /// Choices of a question in insertion order, with live vote counts.
    async fn list_choices(&self, question_id: i32, page: Pagination) -> Result<Paged<Choice>, ServiceError>;
    async fn find_choice(&self, id: i32) -> Result<Option<Choice>, ServiceError>;

    /// Votes of a choice in insertion order.
    async fn list_votes(&self, choice_id: i32, page: Pagination) -> Result<Paged<Vote>, ServiceError>;
    async fn find_vote(&self, id: i32) -> Result<Option<Vote>, ServiceError>;
    /// Inserts the vote unless the voter already holds one on any choice of
    /// `new.question_id`, which fails with [`MSG_MULTIPLE_VOTING`]. The check
    /// and the insert are atomic with respect to other votes on the question.
    async fn create_vote(&self, new: NewVote) -> Result<Vote, ServiceError>;
    async fn update_vote(&self, id: i32, change: VoteChange) -> Result<Vote, ServiceError>;
    async fn delete_vote(&self, id: i32) -> Result<(), ServiceError>;
}
