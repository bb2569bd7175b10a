//! In-process store implementing both repositories, selected with
//! `database.url = "memory://"`. Constraints mirror the SQL schema: unique
//! usernames, emails, question texts and (voter, choice) pairs, plus the
//! delete cascades.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::auth::domain::{AuthUser, Credentials, NewUser, ProfileUpdate, Session};
use crate::auth::errors::AuthError;
use crate::auth::repository::{AuthRepository, MSG_EMAIL_TAKEN, MSG_USERNAME_TAKEN};
use crate::errors::{FieldErrors, ServiceError};
use crate::pagination::{Paged, Pagination};
use crate::polls::domain::{Choice, NewQuestion, NewVote, Question, Vote, VoteChange};
use crate::polls::repository::{PollRepository, MSG_MULTIPLE_VOTING, MSG_QUESTION_TEXT_TAKEN};

#[derive(Debug, Clone)]
struct ChoiceRow {
    id: i32,
    question_id: i32,
    choice_text: String,
}

#[derive(Debug, Clone)]
struct VoteRow {
    id: i32,
    voter_id: i32,
    choice_id: i32,
    hide_voter: bool,
}

#[derive(Default)]
struct State {
    last_id: i32,
    users: BTreeMap<i32, AuthUser>,
    credentials: HashMap<i32, Credentials>,
    tokens: HashMap<String, i32>,
    sessions: HashMap<String, Session>,
    questions: BTreeMap<i32, Question>,
    choices: BTreeMap<i32, ChoiceRow>,
    votes: BTreeMap<i32, VoteRow>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn is_published(&self, q: &Question, now: DateTime<Utc>) -> bool {
        q.date_published <= now && self.choices.values().any(|c| c.question_id == q.id)
    }

    fn choice(&self, row: &ChoiceRow) -> Choice {
        let vote_count = self.votes.values().filter(|v| v.choice_id == row.id).count() as i64;
        Choice { id: row.id, question_id: row.question_id, choice_text: row.choice_text.clone(), vote_count }
    }

    fn vote(&self, row: &VoteRow) -> Vote {
        let voter_username = self.users.get(&row.voter_id).map(|u| u.username.clone()).unwrap_or_default();
        Vote {
            id: row.id,
            voter_id: row.voter_id,
            voter_username,
            choice_id: row.choice_id,
            hide_voter: row.hide_voter,
        }
    }

    fn has_voted(&self, question_id: i32, voter_id: i32) -> bool {
        self.votes.values().any(|v| {
            v.voter_id == voter_id && self.choices.get(&v.choice_id).is_some_and(|c| c.question_id == question_id)
        })
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        !email.is_empty()
            && self
                .users
                .values()
                .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

fn page_of<T>(rows: Vec<T>, page: Pagination) -> Paged<T> {
    let count = rows.len() as u64;
    let window = page.window(rows.len());
    let items = rows.into_iter().skip(window.start).take(window.len()).collect();
    Paged { count, items }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Deactivates a user; accounts are never deleted through the API.
    pub async fn set_active(&self, user_id: i32, active: bool) {
        if let Some(u) = self.state.write().await.users.get_mut(&user_id) {
            u.is_active = active;
        }
    }

    /// Moves a session's expiry, for exercising expiry handling.
    pub async fn set_session_expiry(&self, key: &str, expires_at: DateTime<Utc>) {
        if let Some(s) = self.state.write().await.sessions.get_mut(key) {
            s.expires_at = expires_at;
        }
    }

    /// Stored sessions of `user_id`, expired ones included.
    pub async fn session_count(&self, user_id: i32) -> usize {
        self.state.read().await.sessions.values().filter(|s| s.user_id == user_id).count()
    }
}

#[async_trait]
impl AuthRepository for MemoryStore {
    async fn find_user_by_id(&self, id: i32) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.state.read().await.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<AuthUser, AuthError> {
        let mut st = self.state.write().await;
        if st.users.values().any(|u| u.username == new.username) {
            return Err(AuthError::field("username", MSG_USERNAME_TAKEN));
        }
        let email = models::validate::normalize_email(&new.email);
        if st.email_taken(&email, None) {
            return Err(AuthError::field("email", MSG_EMAIL_TAKEN));
        }
        let id = st.next_id();
        let user = AuthUser {
            id,
            username: new.username,
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            is_active: true,
            email_verified: false,
            date_joined: Utc::now(),
            last_login: None,
        };
        st.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user_id: i32, update: ProfileUpdate) -> Result<AuthUser, AuthError> {
        let mut st = self.state.write().await;
        if let Some(name) = &update.username {
            if st.users.values().any(|u| u.id != user_id && &u.username == name) {
                return Err(AuthError::field("username", MSG_USERNAME_TAKEN));
            }
        }
        let user = st.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
        if let Some(u) = update.username {
            user.username = u;
        }
        if let Some(f) = update.first_name {
            user.first_name = f;
        }
        if let Some(l) = update.last_name {
            user.last_name = l;
        }
        Ok(user.clone())
    }

    async fn record_login(&self, user_id: i32, at: DateTime<Utc>) -> Result<(), AuthError> {
        if let Some(u) = self.state.write().await.users.get_mut(&user_id) {
            u.last_login = Some(at);
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: i32) -> Result<(), AuthError> {
        if let Some(u) = self.state.write().await.users.get_mut(&user_id) {
            u.email_verified = true;
        }
        Ok(())
    }

    async fn get_credentials(&self, user_id: i32) -> Result<Option<Credentials>, AuthError> {
        Ok(self.state.read().await.credentials.get(&user_id).cloned())
    }

    async fn upsert_password(&self, user_id: i32, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError> {
        let c = Credentials { user_id, password_hash, password_algorithm };
        self.state.write().await.credentials.insert(user_id, c.clone());
        Ok(c)
    }

    async fn get_or_create_token(&self, user_id: i32, candidate: String) -> Result<String, AuthError> {
        let mut st = self.state.write().await;
        if let Some((key, _)) = st.tokens.iter().find(|(_, uid)| **uid == user_id) {
            return Ok(key.clone());
        }
        st.tokens.insert(candidate.clone(), user_id);
        Ok(candidate)
    }

    async fn find_user_by_token(&self, key: &str) -> Result<Option<AuthUser>, AuthError> {
        let st = self.state.read().await;
        Ok(st.tokens.get(key).and_then(|uid| st.users.get(uid)).cloned())
    }

    async fn delete_token(&self, user_id: i32) -> Result<(), AuthError> {
        self.state.write().await.tokens.retain(|_, uid| *uid != user_id);
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<(), AuthError> {
        let now = Utc::now();
        let mut st = self.state.write().await;
        st.sessions.retain(|_, s| s.user_id != session.user_id || s.expires_at > now);
        st.sessions.insert(session.key.clone(), session);
        Ok(())
    }

    async fn find_session_user(&self, key: &str, now: DateTime<Utc>) -> Result<Option<AuthUser>, AuthError> {
        let st = self.state.read().await;
        Ok(st
            .sessions
            .get(key)
            .filter(|s| s.expires_at > now)
            .and_then(|s| st.users.get(&s.user_id))
            .cloned())
    }

    async fn delete_session(&self, key: &str) -> Result<(), AuthError> {
        self.state.write().await.sessions.remove(key);
        Ok(())
    }

    async fn delete_sessions_except(&self, user_id: i32, keep: Option<&str>) -> Result<(), AuthError> {
        self.state
            .write()
            .await
            .sessions
            .retain(|k, s| s.user_id != user_id || Some(k.as_str()) == keep);
        Ok(())
    }
}

#[async_trait]
impl PollRepository for MemoryStore {
    async fn list_published_questions(&self, now: DateTime<Utc>, page: Pagination) -> Result<Paged<Question>, ServiceError> {
        let st = self.state.read().await;
        let mut rows: Vec<Question> = st.questions.values().filter(|q| st.is_published(q, now)).cloned().collect();
        rows.sort_by(|a, b| b.date_published.cmp(&a.date_published).then(b.id.cmp(&a.id)));
        Ok(page_of(rows, page))
    }

    async fn find_published_question(&self, id: i32, now: DateTime<Utc>) -> Result<Option<Question>, ServiceError> {
        let st = self.state.read().await;
        Ok(st.questions.get(&id).filter(|q| st.is_published(q, now)).cloned())
    }

    async fn question_text_exists(&self, text: &str) -> Result<bool, ServiceError> {
        Ok(self.state.read().await.questions.values().any(|q| q.question_text == text))
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, ServiceError> {
        let mut st = self.state.write().await;
        if st.questions.values().any(|q| q.question_text == new.question_text) {
            return Err(FieldErrors::single("question_text", MSG_QUESTION_TEXT_TAKEN).into());
        }
        let id = st.next_id();
        let question = Question {
            id,
            author_id: new.author_id,
            question_text: new.question_text,
            date_published: new.date_published,
            date_created: Utc::now(),
        };
        st.questions.insert(id, question.clone());
        for text in new.choices {
            let cid = st.next_id();
            st.choices.insert(cid, ChoiceRow { id: cid, question_id: id, choice_text: text });
        }
        Ok(question)
    }

    async fn delete_question(&self, id: i32) -> Result<(), ServiceError> {
        let mut st = self.state.write().await;
        st.questions.remove(&id);
        let gone: Vec<i32> = st.choices.values().filter(|c| c.question_id == id).map(|c| c.id).collect();
        st.choices.retain(|_, c| c.question_id != id);
        st.votes.retain(|_, v| !gone.contains(&v.choice_id));
        Ok(())
    }

    async fn list_choices(&self, question_id: i32, page: Pagination) -> Result<Paged<Choice>, ServiceError> {
        let st = self.state.read().await;
        let rows: Vec<Choice> = st
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .map(|c| st.choice(c))
            .collect();
        Ok(page_of(rows, page))
    }

    async fn find_choice(&self, id: i32) -> Result<Option<Choice>, ServiceError> {
        let st = self.state.read().await;
        Ok(st.choices.get(&id).map(|c| st.choice(c)))
    }

    async fn list_votes(&self, choice_id: i32, page: Pagination) -> Result<Paged<Vote>, ServiceError> {
        let st = self.state.read().await;
        let rows: Vec<Vote> = st.votes.values().filter(|v| v.choice_id == choice_id).map(|v| st.vote(v)).collect();
        Ok(page_of(rows, page))
    }

    async fn find_vote(&self, id: i32) -> Result<Option<Vote>, ServiceError> {
        let st = self.state.read().await;
        Ok(st.votes.get(&id).map(|v| st.vote(v)))
    }

    async fn create_vote(&self, new: NewVote) -> Result<Vote, ServiceError> {
        let mut st = self.state.write().await;
        if st.has_voted(new.question_id, new.voter_id) {
            return Err(FieldErrors::non_field(MSG_MULTIPLE_VOTING).into());
        }
        let id = st.next_id();
        let row = VoteRow { id, voter_id: new.voter_id, choice_id: new.choice_id, hide_voter: new.hide_voter };
        st.votes.insert(id, row.clone());
        Ok(st.vote(&row))
    }

    async fn update_vote(&self, id: i32, change: VoteChange) -> Result<Vote, ServiceError> {
        let mut st = self.state.write().await;
        let current = st.votes.get(&id).cloned().ok_or_else(|| ServiceError::not_found("vote"))?;
        if let Some(cid) = change.choice_id {
            if st.votes.values().any(|v| v.id != id && v.voter_id == current.voter_id && v.choice_id == cid) {
                return Err(FieldErrors::non_field(MSG_MULTIPLE_VOTING).into());
            }
        }
        let row = VoteRow {
            choice_id: change.choice_id.unwrap_or(current.choice_id),
            hide_voter: change.hide_voter.unwrap_or(current.hide_voter),
            ..current
        };
        st.votes.insert(id, row.clone());
        Ok(st.vote(&row))
    }

    async fn delete_vote(&self, id: i32) -> Result<(), ServiceError> {
        self.state.write().await.votes.remove(&id);
        Ok(())
    }
}
