use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use models::validate;
use tracing::{info, instrument};

use super::domain::{
    Choice, NewQuestion, NewVote, Question, QuestionInput, Vote, VoteChange, VoteInput, MAX_CHOICES, MIN_CHOICES,
};
use super::repository::{PollRepository, MSG_QUESTION_TEXT_TAKEN};
use crate::errors::{FieldErrors, ServiceError};
use crate::pagination::{Paged, Pagination};

pub const MSG_NOT_ACCEPTED: &str = "Is not accepted by this question.";
pub const MSG_TOO_FEW_CHOICES: &str = "Should be at least two.";
pub const MSG_TOO_MANY_CHOICES: &str = "Should not be more than 20.";
pub const MSG_CHOICES_NOT_UNIQUE: &str = "Should be unique.";
pub const MSG_BAD_DATETIME: &str =
    "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

fn invalid_pk(pk: i32) -> String {
    format!("Invalid pk \"{pk}\" - object does not exist.")
}

/// RFC 3339, or a zone-less timestamp taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| naive.and_utc())
}

/// Poll business service independent of web framework
pub struct PollService<R: PollRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: PollRepository + ?Sized> PollService<R> {
    pub fn new(repo: Arc<R>) -> Self { Self { repo } }

    #[instrument(skip(self))]
    pub async fn list_questions(&self, page: Pagination) -> Result<Paged<Question>, ServiceError> {
        self.repo.list_published_questions(Utc::now(), page).await
    }

    pub async fn get_question(&self, id: i32) -> Result<Question, ServiceError> {
        self.repo
            .find_published_question(id, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::not_found("question"))
    }

    /// Create a question with its initial choices; the author is always the requester.
    ///
    /// # Examples
    /// ```
    /// use service::polls::{PollService, domain::{QuestionInput, ChoiceInput}};
    /// use service::memory::MemoryStore;
    /// use std::sync::Arc;
    /// let svc = PollService::new(Arc::new(MemoryStore::default()));
    /// let input = QuestionInput {
    ///     question_text: Some("Tabs or spaces?".into()),
    ///     date_published: Some("2024-01-01T00:00:00Z".into()),
    ///     choices: Some(vec![
    ///         ChoiceInput { choice_text: Some("Tabs".into()) },
    ///         ChoiceInput { choice_text: Some("Spaces".into()) },
    ///     ]),
    /// };
    /// let q = tokio_test::block_on(svc.create_question(1, input)).unwrap();
    /// assert_eq!(q.author_id, 1);
    /// ```
    #[instrument(skip(self, input))]
    pub async fn create_question(&self, author_id: i32, input: QuestionInput) -> Result<Question, ServiceError> {
        let mut errs = FieldErrors::new();

        let question_text = match input.question_text.as_deref() {
            None => {
                errs.add("question_text", validate::MSG_REQUIRED);
                String::new()
            }
            Some(raw) => {
                let t = raw.trim();
                if let Err(e) = validate::text(t, validate::TEXT_MAX) {
                    errs.add("question_text", e.message());
                }
                t.to_string()
            }
        };

        let date_published = match input.date_published.as_deref() {
            None => {
                errs.add("date_published", validate::MSG_REQUIRED);
                None
            }
            Some(raw) => {
                let parsed = parse_datetime(raw);
                if parsed.is_none() {
                    errs.add("date_published", MSG_BAD_DATETIME);
                }
                parsed
            }
        };

        let choices = self.validate_choices(input.choices, &mut errs);

        if !errs.contains("question_text") && self.repo.question_text_exists(&question_text).await? {
            errs.add("question_text", MSG_QUESTION_TEXT_TAKEN);
        }
        errs.into_result()?;

        let Some(date_published) = date_published else {
            return Err(FieldErrors::single("date_published", MSG_BAD_DATETIME).into());
        };
        let question = self
            .repo
            .create_question(NewQuestion { author_id, question_text, date_published, choices })
            .await?;
        info!(question_id = question.id, "question_created");
        Ok(question)
    }

    fn validate_choices(
        &self,
        choices: Option<Vec<super::domain::ChoiceInput>>,
        errs: &mut FieldErrors,
    ) -> Vec<String> {
        let Some(choices) = choices else {
            errs.add("choices", validate::MSG_REQUIRED);
            return Vec::new();
        };
        let mut texts = Vec::with_capacity(choices.len());
        let mut item_errors = false;
        for (i, c) in choices.into_iter().enumerate() {
            let field = format!("choices[{i}].choice_text");
            match c.choice_text.as_deref().map(str::trim) {
                None => {
                    errs.add(field, validate::MSG_REQUIRED);
                    item_errors = true;
                }
                Some(t) => {
                    if let Err(e) = validate::text(t, validate::TEXT_MAX) {
                        errs.add(field, e.message());
                        item_errors = true;
                    }
                    texts.push(t.to_string());
                }
            }
        }
        if item_errors {
            return texts;
        }
        if texts.len() < MIN_CHOICES {
            errs.add("choices", MSG_TOO_FEW_CHOICES);
        } else if texts.len() > MAX_CHOICES {
            errs.add("choices", MSG_TOO_MANY_CHOICES);
        } else if texts.iter().collect::<HashSet<_>>().len() != texts.len() {
            errs.add("choices", MSG_CHOICES_NOT_UNIQUE);
        }
        texts
    }

    /// Only the author may delete; choices and votes go with the question.
    #[instrument(skip(self))]
    pub async fn delete_question(&self, requester_id: i32, id: i32) -> Result<(), ServiceError> {
        let question = self.get_question(id).await?;
        if question.author_id != requester_id {
            return Err(ServiceError::PermissionDenied);
        }
        self.repo.delete_question(id).await?;
        info!(question_id = id, "question_deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_choices(&self, question_id: i32, page: Pagination) -> Result<Paged<Choice>, ServiceError> {
        self.get_question(question_id).await?;
        self.repo.list_choices(question_id, page).await
    }

    pub async fn get_choice(&self, question_id: i32, choice_id: i32) -> Result<Choice, ServiceError> {
        let question = self.get_question(question_id).await?;
        self.repo
            .find_choice(choice_id)
            .await?
            .filter(|c| c.question_id == question.id)
            .ok_or_else(|| ServiceError::not_found("choice"))
    }

    #[instrument(skip(self))]
    pub async fn list_votes(&self, question_id: i32, choice_id: i32, page: Pagination) -> Result<Paged<Vote>, ServiceError> {
        let choice = self.get_choice(question_id, choice_id).await?;
        self.repo.list_votes(choice.id, page).await
    }

    /// Cast the requester's single vote on this question.
    ///
    /// The body `choice`, when present, must belong to the question and wins over the path choice.
    #[instrument(skip(self, input))]
    pub async fn create_vote(
        &self,
        voter_id: i32,
        question_id: i32,
        choice_id: i32,
        input: VoteInput,
    ) -> Result<Vote, ServiceError> {
        let path_choice = self.get_choice(question_id, choice_id).await?;
        let mut errs = FieldErrors::new();
        let target = match input.choice {
            Some(pk) => self.accepted_choice(question_id, pk, &mut errs).await?,
            None => Some(path_choice.id),
        };
        errs.into_result()?;
        let vote = self
            .repo
            .create_vote(NewVote {
                question_id,
                voter_id,
                choice_id: target.unwrap_or(path_choice.id),
                hide_voter: input.hide_voter.unwrap_or(true),
            })
            .await?;
        info!(vote_id = vote.id, choice_id = vote.choice_id, "vote_cast");
        Ok(vote)
    }

    /// The vote, if it sits under the given path and belongs to the requester.
    pub async fn get_vote(
        &self,
        requester_id: i32,
        question_id: i32,
        choice_id: i32,
        vote_id: i32,
    ) -> Result<Vote, ServiceError> {
        let choice = self.get_choice(question_id, choice_id).await?;
        let vote = self
            .repo
            .find_vote(vote_id)
            .await?
            .filter(|v| v.choice_id == choice.id)
            .ok_or_else(|| ServiceError::not_found("vote"))?;
        if vote.voter_id != requester_id {
            return Err(ServiceError::PermissionDenied);
        }
        Ok(vote)
    }

    /// Full (`partial == false`, `hide_voter` required) or partial update of the requester's vote.
    #[instrument(skip(self, input))]
    pub async fn update_vote(
        &self,
        requester_id: i32,
        question_id: i32,
        choice_id: i32,
        vote_id: i32,
        input: VoteInput,
        partial: bool,
    ) -> Result<Vote, ServiceError> {
        let vote = self.get_vote(requester_id, question_id, choice_id, vote_id).await?;
        let mut errs = FieldErrors::new();
        if !partial && input.hide_voter.is_none() {
            errs.add("hide_voter", validate::MSG_REQUIRED);
        }
        let target = match input.choice {
            Some(pk) => self.accepted_choice(question_id, pk, &mut errs).await?,
            None => None,
        };
        errs.into_result()?;
        let updated = self
            .repo
            .update_vote(vote.id, VoteChange { choice_id: target, hide_voter: input.hide_voter })
            .await?;
        info!(vote_id = updated.id, choice_id = updated.choice_id, "vote_updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_vote(
        &self,
        requester_id: i32,
        question_id: i32,
        choice_id: i32,
        vote_id: i32,
    ) -> Result<(), ServiceError> {
        let vote = self.get_vote(requester_id, question_id, choice_id, vote_id).await?;
        self.repo.delete_vote(vote.id).await?;
        info!(vote_id = vote.id, "vote_deleted");
        Ok(())
    }

    /// `Some(pk)` when `pk` is a choice of the question, otherwise records a `choice` error.
    async fn accepted_choice(
        &self,
        question_id: i32,
        pk: i32,
        errs: &mut FieldErrors,
    ) -> Result<Option<i32>, ServiceError> {
        match self.repo.find_choice(pk).await? {
            None => {
                errs.add("choice", invalid_pk(pk));
                Ok(None)
            }
            Some(c) if c.question_id != question_id => {
                errs.add("choice", MSG_NOT_ACCEPTED);
                Ok(None)
            }
            Some(c) => Ok(Some(c.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::domain::{RegisterInput, Registration};
    use crate::polls::domain::ChoiceInput;
    use crate::polls::repository::MSG_MULTIPLE_VOTING;
    use crate::test_support::{memory_harness, test_auth_config, MemoryHarness};

    /// Casts one vote per choice concurrently and returns how many were accepted.
    async fn race_votes<R: PollRepository + ?Sized + 'static>(
        svc: Arc<PollService<R>>,
        voter: i32,
        question_id: i32,
        choice_ids: &[i32],
    ) -> usize {
        let tasks: Vec<_> = choice_ids
            .iter()
            .map(|&cid| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.create_vote(voter, question_id, cid, VoteInput::default()).await })
            })
            .collect();
        let mut accepted = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert_eq!(validation(e).get("non_field_errors").unwrap(), [MSG_MULTIPLE_VOTING]),
            }
        }
        accepted
    }

    const PAST: &str = "2024-01-01T00:00:00Z";

    fn question(text: &str, published: &str, choices: &[&str]) -> QuestionInput {
        QuestionInput {
            question_text: Some(text.into()),
            date_published: Some(published.into()),
            choices: Some(choices.iter().map(|c| ChoiceInput { choice_text: Some((*c).into()) }).collect()),
        }
    }

    async fn user(h: &MemoryHarness, name: &str) -> i32 {
        let input = RegisterInput {
            username: Some(name.into()),
            email: None,
            password1: Some("Str0ng-pass".into()),
            password2: Some("Str0ng-pass".into()),
        };
        match h.auth.register(input).await.unwrap() {
            Registration::Issued(s) => s.user.id,
            Registration::VerificationSent(u) => u.id,
        }
    }

    fn validation(err: ServiceError) -> FieldErrors {
        match err {
            ServiceError::Validation(e) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    async fn seeded(h: &MemoryHarness) -> (i32, Question, Vec<Choice>) {
        let author = user(h, "author").await;
        let q = h.polls.create_question(author, question("Best editor?", PAST, &["vim", "emacs"])).await.unwrap();
        let choices = h.polls.list_choices(q.id, Pagination::default()).await.unwrap().items;
        (author, q, choices)
    }

    #[test]
    fn parses_rfc3339_and_naive_datetimes() {
        assert!(parse_datetime("2024-03-01T10:00:00+02:00").is_some());
        assert_eq!(parse_datetime("2024-03-01T10:00"), parse_datetime("2024-03-01T10:00:00Z"));
        assert!(parse_datetime("yesterday").is_none());
    }

    #[tokio::test]
    async fn create_question_validation() {
        let h = memory_harness(test_auth_config());

        let errs = validation(h.polls.create_question(1, QuestionInput::default()).await.unwrap_err());
        for f in ["question_text", "date_published", "choices"] {
            assert_eq!(errs.get(f).unwrap(), [validate::MSG_REQUIRED], "{f}");
        }

        let errs = validation(h.polls.create_question(1, question("Q1", PAST, &["only"])).await.unwrap_err());
        assert_eq!(errs.get("choices").unwrap(), [MSG_TOO_FEW_CHOICES]);

        let many: Vec<String> = (0..=MAX_CHOICES).map(|i| format!("c{i}")).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        let errs = validation(h.polls.create_question(1, question("Q2", PAST, &many)).await.unwrap_err());
        assert_eq!(errs.get("choices").unwrap(), [MSG_TOO_MANY_CHOICES]);

        let errs = validation(h.polls.create_question(1, question("Q3", PAST, &["a", "a"])).await.unwrap_err());
        assert_eq!(errs.get("choices").unwrap(), [MSG_CHOICES_NOT_UNIQUE]);

        let errs = validation(h.polls.create_question(1, question("Q4", "soon", &["a", ""])).await.unwrap_err());
        assert_eq!(errs.get("date_published").unwrap(), [MSG_BAD_DATETIME]);
        assert_eq!(errs.get("choices[1].choice_text").unwrap(), [validate::MSG_BLANK]);

        h.polls.create_question(1, question("Q5", PAST, &["a", "b"])).await.unwrap();
        let errs = validation(h.polls.create_question(1, question(" Q5 ", PAST, &["a", "b"])).await.unwrap_err());
        assert_eq!(errs.get("question_text").unwrap(), [MSG_QUESTION_TEXT_TAKEN]);
    }

    #[tokio::test]
    async fn future_questions_are_hidden() {
        let h = memory_harness(test_auth_config());
        let past = h.polls.create_question(1, question("Old", PAST, &["a", "b"])).await.unwrap();
        let future = h.polls.create_question(1, question("New", "2999-01-01T00:00:00Z", &["a", "b"])).await.unwrap();

        let page = h.polls.list_questions(Pagination::default()).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].id, past.id);
        assert!(matches!(h.polls.get_question(future.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(h.polls.list_choices(future.id, Pagination::default()).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn questions_list_newest_first() {
        let h = memory_harness(test_auth_config());
        let a = h.polls.create_question(1, question("A", "2024-01-01T00:00:00Z", &["x", "y"])).await.unwrap();
        let b = h.polls.create_question(1, question("B", "2024-02-01T00:00:00Z", &["x", "y"])).await.unwrap();
        let ids: Vec<i32> = h.polls.list_questions(Pagination::default()).await.unwrap().items.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn only_author_deletes_and_delete_cascades() {
        let h = memory_harness(test_auth_config());
        let (author, q, choices) = seeded(&h).await;
        let voter = user(&h, "voter").await;
        let vote = h.polls.create_vote(voter, q.id, choices[0].id, VoteInput::default()).await.unwrap();

        assert!(matches!(h.polls.delete_question(voter, q.id).await, Err(ServiceError::PermissionDenied)));
        h.polls.delete_question(author, q.id).await.unwrap();
        assert!(matches!(h.polls.get_question(q.id).await, Err(ServiceError::NotFound(_))));
        assert!(h.store.find_choice(choices[0].id).await.unwrap().is_none());
        assert!(h.store.find_vote(vote.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn voting_once_per_question() {
        let h = memory_harness(test_auth_config());
        let (_, q, choices) = seeded(&h).await;
        let voter = user(&h, "voter").await;

        let vote = h.polls.create_vote(voter, q.id, choices[0].id, VoteInput::default()).await.unwrap();
        assert!(vote.hide_voter);
        assert_eq!(vote.displayed_voter(), crate::polls::domain::HIDDEN_VOTER);

        let errs = validation(h.polls.create_vote(voter, q.id, choices[1].id, VoteInput::default()).await.unwrap_err());
        assert_eq!(errs.get("non_field_errors").unwrap(), [MSG_MULTIPLE_VOTING]);

        let counted = h.polls.get_choice(q.id, choices[0].id).await.unwrap();
        assert_eq!(counted.vote_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_on_one_question_accept_one() {
        let h = memory_harness(test_auth_config());
        let (_, q, choices) = seeded(&h).await;
        let voter = user(&h, "racer").await;
        let svc = Arc::new(PollService::new(h.store.clone()));
        let ids: Vec<i32> = choices.iter().map(|c| c.id).collect();

        assert_eq!(race_votes(svc.clone(), voter, q.id, &ids).await, 1);
        let total: i64 = svc.list_choices(q.id, Pagination::default()).await.unwrap().items.iter().map(|c| c.vote_count).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn body_choice_wins_and_must_belong_to_question() {
        let h = memory_harness(test_auth_config());
        let (author, q, choices) = seeded(&h).await;
        let other = h.polls.create_question(author, question("Other?", PAST, &["x", "y"])).await.unwrap();
        let foreign = h.polls.list_choices(other.id, Pagination::default()).await.unwrap().items[0].id;
        let voter = user(&h, "voter").await;

        let errs = validation(
            h.polls
                .create_vote(voter, q.id, choices[0].id, VoteInput { choice: Some(foreign), hide_voter: None })
                .await
                .unwrap_err(),
        );
        assert_eq!(errs.get("choice").unwrap(), [MSG_NOT_ACCEPTED]);

        let errs = validation(
            h.polls
                .create_vote(voter, q.id, choices[0].id, VoteInput { choice: Some(9999), hide_voter: None })
                .await
                .unwrap_err(),
        );
        assert_eq!(errs.get("choice").unwrap(), ["Invalid pk \"9999\" - object does not exist."]);

        let vote = h
            .polls
            .create_vote(voter, q.id, choices[0].id, VoteInput { choice: Some(choices[1].id), hide_voter: Some(false) })
            .await
            .unwrap();
        assert_eq!(vote.choice_id, choices[1].id);
        assert_eq!(vote.displayed_voter(), "voter");
    }

    #[tokio::test]
    async fn vote_owner_updates_and_deletes() {
        let h = memory_harness(test_auth_config());
        let (author, q, choices) = seeded(&h).await;
        let voter = user(&h, "voter").await;
        let vote = h.polls.create_vote(voter, q.id, choices[0].id, VoteInput::default()).await.unwrap();

        assert!(matches!(
            h.polls.get_vote(author, q.id, choices[0].id, vote.id).await,
            Err(ServiceError::PermissionDenied)
        ));
        assert!(matches!(
            h.polls.get_vote(voter, q.id, choices[1].id, vote.id).await,
            Err(ServiceError::NotFound(_))
        ));

        let errs = validation(
            h.polls
                .update_vote(voter, q.id, choices[0].id, vote.id, VoteInput { choice: Some(choices[1].id), hide_voter: None }, false)
                .await
                .unwrap_err(),
        );
        assert_eq!(errs.get("hide_voter").unwrap(), [validate::MSG_REQUIRED]);

        let moved = h
            .polls
            .update_vote(voter, q.id, choices[0].id, vote.id, VoteInput { choice: Some(choices[1].id), hide_voter: None }, true)
            .await
            .unwrap();
        assert_eq!(moved.choice_id, choices[1].id);
        assert!(moved.hide_voter);
        assert_eq!(h.polls.get_choice(q.id, choices[0].id).await.unwrap().vote_count, 0);

        assert!(matches!(
            h.polls.delete_vote(voter, q.id, choices[0].id, vote.id).await,
            Err(ServiceError::NotFound(_))
        ));
        h.polls.delete_vote(voter, q.id, choices[1].id, vote.id).await.unwrap();
        assert!(h.polls.list_votes(q.id, choices[1].id, Pagination::default()).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn seaorm_repository_enforces_single_vote() -> Result<(), anyhow::Error> {
        use crate::auth::repo::seaorm::SeaOrmAuthRepository;
        use crate::auth::repository::AuthRepository;
        use crate::auth::domain::NewUser;
        use crate::polls::repo::seaorm::SeaOrmPollRepository;
        use crate::test_support::{get_db, unique};

        let Some(db) = get_db().await else { return Ok(()) };
        let users = SeaOrmAuthRepository::new(db.clone());
        let author = users
            .create_user(NewUser { username: unique("author"), ..Default::default() })
            .await?;
        let voter = users
            .create_user(NewUser { username: unique("voter"), ..Default::default() })
            .await?;

        let svc = PollService::new(Arc::new(SeaOrmPollRepository::new(db)));
        let q = svc.create_question(author.id, question(&unique("q"), PAST, &["yes", "no"])).await?;
        let choices = svc.list_choices(q.id, Pagination::default()).await?.items;
        assert_eq!(choices.len(), 2);

        let vote = svc.create_vote(voter.id, q.id, choices[0].id, VoteInput::default()).await?;
        assert_eq!(vote.voter_username, voter.username);
        assert!(svc.create_vote(voter.id, q.id, choices[1].id, VoteInput::default()).await.is_err());
        assert_eq!(svc.get_choice(q.id, choices[0].id).await?.vote_count, 1);

        svc.delete_question(author.id, q.id).await?;
        assert!(matches!(svc.get_question(q.id).await, Err(ServiceError::NotFound(_))));
        Ok(())
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn seaorm_concurrent_votes_and_huge_offset() -> Result<(), anyhow::Error> {
        use crate::auth::domain::NewUser;
        use crate::auth::repo::seaorm::SeaOrmAuthRepository;
        use crate::auth::repository::AuthRepository;
        use crate::pagination::PageSettings;
        use crate::polls::repo::seaorm::SeaOrmPollRepository;
        use crate::test_support::{get_db, unique};

        let Some(db) = get_db().await else { return Ok(()) };
        let users = SeaOrmAuthRepository::new(db.clone());
        let author = users.create_user(NewUser { username: unique("author"), ..Default::default() }).await?;
        let svc = Arc::new(PollService::new(Arc::new(SeaOrmPollRepository::new(db))));

        for _ in 0..10 {
            let voter = users.create_user(NewUser { username: unique("racer"), ..Default::default() }).await?;
            let q = svc.create_question(author.id, question(&unique("race"), PAST, &["left", "right", "up"])).await?;
            let ids: Vec<i32> = svc.list_choices(q.id, Pagination::default()).await?.items.iter().map(|c| c.id).collect();
            assert_eq!(race_votes(svc.clone(), voter.id, q.id, &ids).await, 1);
        }

        let far = Pagination::from_query(Some("10"), Some("18446744073709551615"), PageSettings::default());
        let page = svc.list_questions(far).await?;
        assert!(page.items.is_empty());
        assert!(page.count > 0);
        Ok(())
    }
}
