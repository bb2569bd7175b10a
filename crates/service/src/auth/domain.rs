use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login input; either `username` or `email` identifies the account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Registration input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password1: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeInput {
    #[serde(default)]
    pub new_password1: Option<String>,
    #[serde(default)]
    pub new_password2: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordResetInput {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordResetConfirmInput {
    #[serde(default)]
    pub new_password1: Option<String>,
    #[serde(default)]
    pub new_password2: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyEmailInput {
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResendEmailInput {
    #[serde(default)]
    pub email: Option<String>,
}

/// Writable profile fields; `pk` and `email` sent by clients are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDetailsInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Domain user (business view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Row to insert on registration.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Validated profile change; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Domain credentials (hashed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: i32,
    pub password_hash: String,
    pub password_algorithm: String,
}

/// Server-side session referenced by the `sessionid` cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub key: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

/// Login result: the API token plus a fresh cookie session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub token: String,
    pub session: Session,
}

#[derive(Debug, Clone)]
pub enum Registration {
    /// Account usable immediately.
    Issued(AuthSession),
    /// Account waits for the emailed verification key.
    VerificationSent(AuthUser),
}

/// Public profile shape returned by the user-detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    pub pk: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&AuthUser> for UserDetails {
    fn from(u: &AuthUser) -> Self {
        Self {
            pk: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
        }
    }
}
