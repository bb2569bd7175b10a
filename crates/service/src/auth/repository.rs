use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{AuthUser, Credentials, NewUser, ProfileUpdate, Session};
use super::errors::AuthError;

pub const MSG_USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const MSG_EMAIL_TAKEN: &str = "A user is already registered with this e-mail address.";

/// Repository abstraction for auth-related persistence.
///
/// Implementations report uniqueness violations as [`AuthError::Validation`]
/// keyed by the offending field, using the messages above.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_user_by_id(&self, id: i32) -> Result<Option<AuthUser>, AuthError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError>;
    /// Case-insensitive lookup; blank emails never match.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn create_user(&self, user: NewUser) -> Result<AuthUser, AuthError>;
    async fn update_user(&self, user_id: i32, update: ProfileUpdate) -> Result<AuthUser, AuthError>;
    async fn record_login(&self, user_id: i32, at: DateTime<Utc>) -> Result<(), AuthError>;
    async fn mark_email_verified(&self, user_id: i32) -> Result<(), AuthError>;

    async fn get_credentials(&self, user_id: i32) -> Result<Option<Credentials>, AuthError>;
    async fn upsert_password(&self, user_id: i32, password_hash: String, password_algorithm: String) -> Result<Credentials, AuthError>;

    /// Returns the user's existing token, or stores `candidate` and returns it.
    async fn get_or_create_token(&self, user_id: i32, candidate: String) -> Result<String, AuthError>;
    async fn find_user_by_token(&self, key: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn delete_token(&self, user_id: i32) -> Result<(), AuthError>;

    /// Stores `session` and drops the owner's sessions that have already expired.
    async fn create_session(&self, session: Session) -> Result<(), AuthError>;
    /// Owner of a session that has not expired at `now`.
    async fn find_session_user(&self, key: &str, now: DateTime<Utc>) -> Result<Option<AuthUser>, AuthError>;
    async fn delete_session(&self, key: &str) -> Result<(), AuthError>;
    /// Drops every session of `user_id` except `keep`.
    async fn delete_sessions_except(&self, user_id: i32, keep: Option<&str>) -> Result<(), AuthError>;
}
