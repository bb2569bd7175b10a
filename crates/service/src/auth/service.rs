use std::sync::Arc;

use chrono::{Duration, Utc};
use configs::{AuthSettings, EmailVerification};
use models::validate;
use tracing::{debug, info, instrument, warn};

use super::domain::{
    AuthSession, AuthUser, LoginInput, NewUser, PasswordChangeInput, PasswordResetConfirmInput,
    PasswordResetInput, ProfileUpdate, RegisterInput, Registration, ResendEmailInput, Session,
    UserDetails, UserDetailsInput, VerifyEmailInput,
};
use super::errors::AuthError;
use super::mailer::{Mailer, OutboundEmail};
use super::password::{self, HashCost};
use super::repository::{AuthRepository, MSG_USERNAME_TAKEN, MSG_EMAIL_TAKEN};
use super::tokens::{generate_session_key, generate_token_key, LinkPurpose, LinkSigner};
use crate::errors::FieldErrors;

pub const MSG_BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";
pub const MSG_MUST_INCLUDE: &str = "Must include \"username\" and \"password\".";
pub const MSG_DISABLED: &str = "User account is disabled.";
pub const MSG_NOT_VERIFIED: &str = "E-mail is not verified.";
pub const MSG_PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const MSG_NEW_PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
    pub verify_ttl: Duration,
    pub email_verification: EmailVerification,
    pub frontend_url: String,
    pub hash_cost: HashCost,
    pub password_algorithm: String,
}

impl AuthConfig {
    /// Defaults matching an empty `[auth]` section, signed with `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self::from_settings(&AuthSettings { secret: secret.into(), ..AuthSettings::default() })
    }

    pub fn from_settings(s: &AuthSettings) -> Self {
        let secs = |v: u64| {
            i64::try_from(v).ok().and_then(Duration::try_seconds).unwrap_or_else(|| Duration::days(36_500))
        };
        Self {
            secret: s.secret.clone(),
            session_ttl: secs(s.session_ttl_secs),
            reset_ttl: secs(s.password_reset_ttl_secs),
            verify_ttl: secs(s.email_confirmation_ttl_secs),
            email_verification: s.email_verification,
            frontend_url: s.frontend_url.clone(),
            hash_cost: HashCost { memory_kib: s.password_hash_memory_kib, iterations: s.password_hash_iterations },
            password_algorithm: password::ALGORITHM.to_string(),
        }
    }
}

/// Collects a required string field, recording "required"/"blank" errors. Returns "" on error.
fn require<'a>(errs: &mut FieldErrors, field: &str, value: &'a Option<String>, trim: bool) -> &'a str {
    match value.as_deref() {
        None => {
            errs.add(field, validate::MSG_REQUIRED);
            ""
        }
        Some(v) => {
            let v = if trim { v.trim() } else { v };
            if v.is_empty() {
                errs.add(field, validate::MSG_BLANK);
            }
            v
        }
    }
}

/// Collects a required, well-formed email address.
fn require_email<'a>(errs: &mut FieldErrors, value: &'a Option<String>) -> &'a str {
    let email = require(errs, "email", value, true);
    if !email.is_empty() {
        if let Err(e) = validate::email(email) {
            errs.add("email", e.message());
        }
    }
    email
}

/// Auth business service independent of web framework
pub struct AuthService<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    mailer: Arc<dyn Mailer>,
    cfg: AuthConfig,
    links: LinkSigner,
}

impl<R: AuthRepository + ?Sized> AuthService<R> {
    pub fn new(repo: Arc<R>, mailer: Arc<dyn Mailer>, cfg: AuthConfig) -> Self {
        let links = LinkSigner::new(cfg.secret.clone(), cfg.reset_ttl, cfg.verify_ttl);
        Self { repo, mailer, cfg, links }
    }

    pub fn config(&self) -> &AuthConfig { &self.cfg }

    /// Authenticate by username (or email) and password, issuing a token and a session.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, AuthConfig, mailer::LogMailer, domain::{RegisterInput, LoginInput}};
    /// use service::memory::MemoryStore;
    /// use std::sync::Arc;
    /// let mut cfg = AuthConfig::new("secret");
    /// cfg.hash_cost = service::auth::password::HashCost { memory_kib: 8, iterations: 1 };
    /// let svc = AuthService::new(Arc::new(MemoryStore::default()), Arc::new(LogMailer), cfg);
    /// let reg = RegisterInput { username: Some("u1".into()), email: None, password1: Some("Passw0rd!x".into()), password2: Some("Passw0rd!x".into()) };
    /// tokio_test::block_on(svc.register(reg)).unwrap();
    /// let login = LoginInput { username: Some("u1".into()), email: None, password: Some("Passw0rd!x".into()) };
    /// let session = tokio_test::block_on(svc.login(login)).unwrap();
    /// assert_eq!(session.user.username, "u1");
    /// assert_eq!(session.token.len(), 40);
    /// ```
    #[instrument(skip(self, input), fields(username = ?input.username, email = ?input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let mut errs = FieldErrors::new();
        let password = require(&mut errs, "password", &input.password, false);
        errs.into_result()?;

        let username = input.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let email = input.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let found = match (username, email) {
            (Some(u), _) => self.repo.find_user_by_username(u).await?,
            (None, Some(e)) => self.repo.find_user_by_email(&validate::normalize_email(e)).await?,
            (None, None) => return Err(AuthError::non_field(MSG_MUST_INCLUDE)),
        };

        let user = match found {
            Some(user) if self.check_password(user.id, password).await? => user,
            _ => {
                warn!("login_failed");
                return Err(AuthError::non_field(MSG_BAD_CREDENTIALS));
            }
        };
        if !user.is_active {
            return Err(AuthError::non_field(MSG_DISABLED));
        }
        if self.cfg.email_verification == EmailVerification::Mandatory && !user.email_verified {
            return Err(AuthError::non_field(MSG_NOT_VERIFIED));
        }

        let session = self.issue(user).await?;
        info!(user_id = session.user.id, "user_logged_in");
        Ok(session)
    }

    /// Delete the caller's token and current session. Anonymous callers are a no-op.
    #[instrument(skip(self, user, session_key), fields(user_id = user.map(|u| u.id)))]
    pub async fn logout(&self, user: Option<&AuthUser>, session_key: Option<&str>) -> Result<(), AuthError> {
        if let Some(user) = user {
            self.repo.delete_token(user.id).await?;
        }
        if let Some(key) = session_key {
            self.repo.delete_session(key).await?;
        }
        debug!("logged_out");
        Ok(())
    }

    /// Register a new user with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, AuthConfig, mailer::LogMailer, domain::{RegisterInput, Registration}};
    /// use service::memory::MemoryStore;
    /// use std::sync::Arc;
    /// let mut cfg = AuthConfig::new("secret");
    /// cfg.hash_cost = service::auth::password::HashCost { memory_kib: 8, iterations: 1 };
    /// let svc = AuthService::new(Arc::new(MemoryStore::default()), Arc::new(LogMailer), cfg);
    /// let input = RegisterInput {
    ///     username: Some("alice".into()),
    ///     email: Some("alice@example.com".into()),
    ///     password1: Some("S3cure-pass".into()),
    ///     password2: Some("S3cure-pass".into()),
    /// };
    /// match tokio_test::block_on(svc.register(input)).unwrap() {
    ///     Registration::Issued(s) => assert_eq!(s.user.email, "alice@example.com"),
    ///     Registration::VerificationSent(_) => unreachable!(),
    /// }
    /// ```
    #[instrument(skip(self, input), fields(username = ?input.username, email = ?input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<Registration, AuthError> {
        let mut errs = FieldErrors::new();
        let username = require(&mut errs, "username", &input.username, true);
        if !username.is_empty() {
            if let Err(e) = validate::username(username) {
                errs.add("username", e.message());
            }
        }

        let email = input.email.as_deref().map(str::trim).unwrap_or("");
        if email.is_empty() {
            if self.cfg.email_verification == EmailVerification::Mandatory {
                let msg = if input.email.is_none() { validate::MSG_REQUIRED } else { validate::MSG_BLANK };
                errs.add("email", msg);
            }
        } else if let Err(e) = validate::email(email) {
            errs.add("email", e.message());
        }

        let password1 = require(&mut errs, "password1", &input.password1, false);
        let password2 = require(&mut errs, "password2", &input.password2, false);
        if !password1.is_empty() {
            errs.extend("password1", password::validate_strength(password1, Some(username)));
        }

        if !username.is_empty() && !errs.contains("username") && self.repo.find_user_by_username(username).await?.is_some() {
            errs.add("username", MSG_USERNAME_TAKEN);
        }
        let email = validate::normalize_email(email);
        if !email.is_empty() && !errs.contains("email") && self.repo.find_user_by_email(&email).await?.is_some() {
            errs.add("email", MSG_EMAIL_TAKEN);
        }
        errs.into_result()?;

        if password1 != password2 {
            return Err(AuthError::non_field(MSG_PASSWORD_MISMATCH));
        }

        let hash = password::hash_password(self.cfg.hash_cost, password1)?;
        let user = self
            .repo
            .create_user(NewUser { username: username.to_string(), email, ..Default::default() })
            .await?;
        self.repo.upsert_password(user.id, hash, self.cfg.password_algorithm.clone()).await?;
        info!(user_id = user.id, username = %user.username, "user_registered");

        if !user.email.is_empty() && self.cfg.email_verification != EmailVerification::None {
            self.send_verification(&user).await?;
        }
        if self.cfg.email_verification == EmailVerification::Mandatory {
            return Ok(Registration::VerificationSent(user));
        }
        Ok(Registration::Issued(self.issue(user).await?))
    }

    /// Set a new password for an authenticated user; other sessions are dropped.
    #[instrument(skip(self, user, current_session, input), fields(user_id = user.id))]
    pub async fn change_password(
        &self,
        user: &AuthUser,
        current_session: Option<&str>,
        input: PasswordChangeInput,
    ) -> Result<(), AuthError> {
        let mut errs = FieldErrors::new();
        let p1 = require(&mut errs, "new_password1", &input.new_password1, false);
        let p2 = require(&mut errs, "new_password2", &input.new_password2, false);
        errs.into_result()?;
        self.check_new_password(p1, p2, &user.username)?;

        let hash = password::hash_password(self.cfg.hash_cost, p2)?;
        self.repo.upsert_password(user.id, hash, self.cfg.password_algorithm.clone()).await?;
        self.repo.delete_sessions_except(user.id, current_session).await?;
        info!("password_changed");
        Ok(())
    }

    /// Mail a reset link when an active account owns `email`. Succeeds either way.
    #[instrument(skip(self, input))]
    pub async fn request_password_reset(&self, input: PasswordResetInput) -> Result<(), AuthError> {
        let mut errs = FieldErrors::new();
        let email = require_email(&mut errs, &input.email);
        errs.into_result()?;

        let Some(user) = self.repo.find_user_by_email(&validate::normalize_email(email)).await? else {
            debug!("password_reset_unknown_email");
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }
        let Some(creds) = self.repo.get_credentials(user.id).await? else {
            return Ok(());
        };
        let bind = password::fingerprint(&self.cfg.secret, &creds.password_hash)?;
        let token = self.links.sign(LinkPurpose::PasswordReset, user.id, &bind)?;
        self.mailer
            .send(OutboundEmail::password_reset(&user.email, &self.cfg.frontend_url, user.id.to_string(), token))
            .await?;
        info!(user_id = user.id, "password_reset_sent");
        Ok(())
    }

    /// Consume a reset link. Every link defect maps to [`AuthError::InvalidResetLink`].
    #[instrument(skip(self, input), fields(uid = ?input.uid))]
    pub async fn confirm_password_reset(&self, input: PasswordResetConfirmInput) -> Result<(), AuthError> {
        let mut errs = FieldErrors::new();
        let p1 = require(&mut errs, "new_password1", &input.new_password1, false);
        let p2 = require(&mut errs, "new_password2", &input.new_password2, false);
        let uid = require(&mut errs, "uid", &input.uid, true);
        let token = require(&mut errs, "token", &input.token, true);
        errs.into_result()?;

        let user_id: i32 = uid.parse().map_err(|_| AuthError::InvalidResetLink)?;
        let link = self.links.verify(LinkPurpose::PasswordReset, token).ok_or(AuthError::InvalidResetLink)?;
        if link.user_id != user_id {
            return Err(AuthError::InvalidResetLink);
        }
        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidResetLink)?;
        let creds = self.repo.get_credentials(user_id).await?.ok_or(AuthError::InvalidResetLink)?;
        if password::fingerprint(&self.cfg.secret, &creds.password_hash)? != link.bind {
            warn!(user_id, "password_reset_link_reused");
            return Err(AuthError::InvalidResetLink);
        }
        self.check_new_password(p1, p2, &user.username)?;

        let hash = password::hash_password(self.cfg.hash_cost, p2)?;
        self.repo.upsert_password(user_id, hash, self.cfg.password_algorithm.clone()).await?;
        self.repo.delete_sessions_except(user_id, None).await?;
        info!(user_id, "password_reset_completed");
        Ok(())
    }

    /// Mark the address bound into `key` as verified. Unknown keys are [`AuthError::NotFound`].
    #[instrument(skip(self, input))]
    pub async fn verify_email(&self, input: VerifyEmailInput) -> Result<(), AuthError> {
        let mut errs = FieldErrors::new();
        let key = require(&mut errs, "key", &input.key, true);
        errs.into_result()?;

        let link = self.links.verify(LinkPurpose::EmailVerification, key).ok_or(AuthError::NotFound)?;
        let user = self.repo.find_user_by_id(link.user_id).await?.ok_or(AuthError::NotFound)?;
        if user.email.is_empty() || user.email != link.bind {
            return Err(AuthError::NotFound);
        }
        self.repo.mark_email_verified(user.id).await?;
        info!(user_id = user.id, "email_verified");
        Ok(())
    }

    /// Re-send the verification mail for an unverified account. Succeeds either way.
    #[instrument(skip(self, input))]
    pub async fn resend_verification(&self, input: ResendEmailInput) -> Result<(), AuthError> {
        let mut errs = FieldErrors::new();
        let email = require_email(&mut errs, &input.email);
        errs.into_result()?;

        if let Some(user) = self.repo.find_user_by_email(&validate::normalize_email(email)).await? {
            if !user.email_verified {
                self.send_verification(&user).await?;
            }
        }
        Ok(())
    }

    pub fn user_details(&self, user: &AuthUser) -> UserDetails {
        UserDetails::from(user)
    }

    /// Update the writable profile fields. A full update (`partial == false`) requires `username`.
    #[instrument(skip(self, user, input), fields(user_id = user.id))]
    pub async fn update_user_details(
        &self,
        user: &AuthUser,
        input: UserDetailsInput,
        partial: bool,
    ) -> Result<UserDetails, AuthError> {
        let mut errs = FieldErrors::new();
        let username = match input.username.as_deref() {
            None => {
                if !partial {
                    errs.add("username", validate::MSG_REQUIRED);
                }
                None
            }
            Some(raw) => {
                let u = raw.trim();
                if let Err(e) = validate::username(u) {
                    errs.add("username", e.message());
                }
                Some(u.to_string())
            }
        };
        for (field, value) in [("first_name", &input.first_name), ("last_name", &input.last_name)] {
            if let Some(v) = value {
                if let Err(e) = validate::optional_text(v.trim(), validate::NAME_MAX) {
                    errs.add(field, e.message());
                }
            }
        }
        if let Some(u) = username.as_deref() {
            if !errs.contains("username") && u != user.username {
                if let Some(other) = self.repo.find_user_by_username(u).await? {
                    if other.id != user.id {
                        errs.add("username", MSG_USERNAME_TAKEN);
                    }
                }
            }
        }
        errs.into_result()?;

        let update = ProfileUpdate {
            username,
            first_name: input.first_name.map(|s| s.trim().to_string()),
            last_name: input.last_name.map(|s| s.trim().to_string()),
        };
        let updated = self.repo.update_user(user.id, update).await?;
        Ok(UserDetails::from(&updated))
    }

    /// Resolve `Authorization: Token <key>`.
    pub async fn authenticate_token(&self, key: &str) -> Result<AuthUser, AuthError> {
        let user = self.repo.find_user_by_token(key).await?.ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }
        Ok(user)
    }

    /// Resolve a `sessionid` cookie; unknown or expired sessions are anonymous.
    pub async fn authenticate_session(&self, key: &str) -> Result<Option<AuthUser>, AuthError> {
        let user = self.repo.find_session_user(key, Utc::now()).await?;
        Ok(user.filter(|u| u.is_active))
    }

    async fn check_password(&self, user_id: i32, plain: &str) -> Result<bool, AuthError> {
        match self.repo.get_credentials(user_id).await? {
            Some(creds) => password::verify_password(&creds.password_hash, plain),
            None => Ok(false),
        }
    }

    fn check_new_password(&self, p1: &str, p2: &str, username: &str) -> Result<(), AuthError> {
        if p1 != p2 {
            return Err(AuthError::field("new_password2", MSG_NEW_PASSWORD_MISMATCH));
        }
        let mut errs = FieldErrors::new();
        errs.extend("new_password2", password::validate_strength(p2, Some(username)));
        Ok(errs.into_result()?)
    }

    async fn issue(&self, user: AuthUser) -> Result<AuthSession, AuthError> {
        let now = Utc::now();
        let token = self.repo.get_or_create_token(user.id, generate_token_key()).await?;
        let session = Session { key: generate_session_key(), user_id: user.id, expires_at: now + self.cfg.session_ttl };
        self.repo.create_session(session.clone()).await?;
        self.repo.record_login(user.id, now).await?;
        let user = AuthUser { last_login: Some(now), ..user };
        Ok(AuthSession { user, token, session })
    }

    async fn send_verification(&self, user: &AuthUser) -> Result<(), AuthError> {
        let key = self.links.sign(LinkPurpose::EmailVerification, user.id, &user.email)?;
        self.mailer
            .send(OutboundEmail::email_verification(&user.email, &self.cfg.frontend_url, key))
            .await?;
        info!(user_id = user.id, "verification_email_sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mailer::EmailKind;
    use crate::test_support::{memory_harness, test_auth_config, MemoryHarness};

    fn register_input(username: &str, email: Option<&str>, password: &str) -> RegisterInput {
        RegisterInput {
            username: Some(username.into()),
            email: email.map(Into::into),
            password1: Some(password.into()),
            password2: Some(password.into()),
        }
    }

    async fn registered(h: &MemoryHarness, username: &str, email: &str) -> AuthSession {
        match h.auth.register(register_input(username, Some(email), "Str0ng-pass")).await.unwrap() {
            Registration::Issued(s) => s,
            Registration::VerificationSent(_) => panic!("expected token"),
        }
    }

    fn field_errors(err: AuthError) -> FieldErrors {
        match err {
            AuthError::Validation(e) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_same_token() {
        let h = memory_harness(test_auth_config());
        let reg = registered(&h, "alice", "alice@example.com").await;
        let login = h
            .auth
            .login(LoginInput { username: Some("alice".into()), email: None, password: Some("Str0ng-pass".into()) })
            .await
            .unwrap();
        assert_eq!(reg.token, login.token);
        assert_ne!(reg.session.key, login.session.key);
        assert_eq!(h.auth.authenticate_token(&login.token).await.unwrap().id, reg.user.id);
        assert!(login.user.last_login.is_some());
    }

    #[tokio::test]
    async fn login_by_email_is_case_insensitive() {
        let h = memory_harness(test_auth_config());
        registered(&h, "bob", "bob@example.com").await;
        let s = h
            .auth
            .login(LoginInput { username: None, email: Some("BOB@example.com".into()), password: Some("Str0ng-pass".into()) })
            .await
            .unwrap();
        assert_eq!(s.user.username, "bob");
    }

    #[tokio::test]
    async fn login_failures() {
        let h = memory_harness(test_auth_config());
        registered(&h, "carol", "carol@example.com").await;

        let bad = h
            .auth
            .login(LoginInput { username: Some("carol".into()), email: None, password: Some("nope".into()) })
            .await
            .unwrap_err();
        assert_eq!(field_errors(bad).get("non_field_errors").unwrap(), [MSG_BAD_CREDENTIALS]);

        let missing = h.auth.login(LoginInput::default()).await.unwrap_err();
        assert_eq!(field_errors(missing).get("password").unwrap(), [validate::MSG_REQUIRED]);

        let neither = h
            .auth
            .login(LoginInput { username: None, email: None, password: Some("x".into()) })
            .await
            .unwrap_err();
        assert_eq!(field_errors(neither).get("non_field_errors").unwrap(), [MSG_MUST_INCLUDE]);
    }

    #[tokio::test]
    async fn inactive_user_cannot_log_in() {
        let h = memory_harness(test_auth_config());
        let s = registered(&h, "dave", "dave@example.com").await;
        h.store.set_active(s.user.id, false).await;
        let err = h
            .auth
            .login(LoginInput { username: Some("dave".into()), email: None, password: Some("Str0ng-pass".into()) })
            .await
            .unwrap_err();
        assert_eq!(field_errors(err).get("non_field_errors").unwrap(), [MSG_DISABLED]);
        assert!(matches!(h.auth.authenticate_token(&s.token).await, Err(AuthError::InactiveUser)));
    }

    #[tokio::test]
    async fn registration_validation() {
        let h = memory_harness(test_auth_config());
        registered(&h, "erin", "erin@example.com").await;

        let err = h.auth.register(register_input("erin", Some("ERIN@example.com"), "Str0ng-pass")).await.unwrap_err();
        let errs = field_errors(err);
        assert_eq!(errs.get("username").unwrap(), [MSG_USERNAME_TAKEN]);
        assert_eq!(errs.get("email").unwrap(), [MSG_EMAIL_TAKEN]);

        let err = h.auth.register(register_input("bad name", Some("x"), "123")).await.unwrap_err();
        let errs = field_errors(err);
        assert!(errs.contains("username"));
        assert_eq!(errs.get("email").unwrap(), [validate::MSG_INVALID_EMAIL]);
        assert!(errs.get("password1").unwrap().len() >= 2);

        let mut mismatch = register_input("frank", None, "Str0ng-pass");
        mismatch.password2 = Some("Other-pass1".into());
        let errs = field_errors(h.auth.register(mismatch).await.unwrap_err());
        assert_eq!(errs.get("non_field_errors").unwrap(), [MSG_PASSWORD_MISMATCH]);
    }

    #[tokio::test]
    async fn mandatory_verification_defers_token() {
        let mut cfg = test_auth_config();
        cfg.email_verification = EmailVerification::Mandatory;
        let h = memory_harness(cfg);

        let errs = field_errors(h.auth.register(register_input("gina", None, "Str0ng-pass")).await.unwrap_err());
        assert_eq!(errs.get("email").unwrap(), [validate::MSG_REQUIRED]);

        let out = h.auth.register(register_input("gina", Some("gina@example.com"), "Str0ng-pass")).await.unwrap();
        assert!(matches!(out, Registration::VerificationSent(_)));

        let login = LoginInput { username: Some("gina".into()), email: None, password: Some("Str0ng-pass".into()) };
        let errs = field_errors(h.auth.login(login.clone()).await.unwrap_err());
        assert_eq!(errs.get("non_field_errors").unwrap(), [MSG_NOT_VERIFIED]);

        let Some(mail) = h.mailer.last_to("gina@example.com").await else { panic!("no mail") };
        let EmailKind::EmailVerification { key } = mail.kind else { panic!("wrong mail") };
        h.auth.verify_email(VerifyEmailInput { key: Some(key) }).await.unwrap();
        assert!(h.auth.login(login).await.is_ok());
    }

    #[tokio::test]
    async fn verify_email_rejects_garbage_key() {
        let h = memory_harness(test_auth_config());
        let err = h.auth.verify_email(VerifyEmailInput { key: Some("nope".into()) }).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn resend_only_for_unverified_accounts() {
        let h = memory_harness(test_auth_config());
        registered(&h, "hank", "hank@example.com").await;
        let before = h.mailer.sent().await.len();
        h.auth.resend_verification(ResendEmailInput { email: Some("hank@example.com".into()) }).await.unwrap();
        h.auth.resend_verification(ResendEmailInput { email: Some("nobody@example.com".into()) }).await.unwrap();
        assert_eq!(h.mailer.sent().await.len(), before + 1);
    }

    #[tokio::test]
    async fn password_reset_is_single_use_and_silent_for_unknown_email() {
        let h = memory_harness(test_auth_config());
        let s = registered(&h, "ivy", "ivy@example.com").await;

        h.auth.request_password_reset(PasswordResetInput { email: Some("ghost@example.com".into()) }).await.unwrap();
        assert!(h.mailer.last_to("ghost@example.com").await.is_none());

        h.auth.request_password_reset(PasswordResetInput { email: Some("ivy@example.com".into()) }).await.unwrap();
        let Some(mail) = h.mailer.last_to("ivy@example.com").await else { panic!("no mail") };
        let EmailKind::PasswordReset { uid, token } = mail.kind else { panic!("wrong mail") };
        assert_eq!(uid, s.user.id.to_string());

        let confirm = PasswordResetConfirmInput {
            new_password1: Some("Brand-new-9".into()),
            new_password2: Some("Brand-new-9".into()),
            uid: Some(uid),
            token: Some(token),
        };
        h.auth.confirm_password_reset(confirm.clone()).await.unwrap();
        assert!(matches!(h.auth.confirm_password_reset(confirm).await, Err(AuthError::InvalidResetLink)));

        // sessions are dropped, the token survives
        assert!(h.auth.authenticate_session(&s.session.key).await.unwrap().is_none());
        assert!(h.auth.authenticate_token(&s.token).await.is_ok());
        let login = LoginInput { username: Some("ivy".into()), email: None, password: Some("Brand-new-9".into()) };
        assert!(h.auth.login(login).await.is_ok());
    }

    #[tokio::test]
    async fn password_reset_confirm_rejects_bad_uid_and_token() {
        let h = memory_harness(test_auth_config());
        registered(&h, "jack", "jack@example.com").await;
        for (uid, token) in [("abc", "x"), ("1", "garbage"), ("999", "garbage")] {
            let input = PasswordResetConfirmInput {
                new_password1: Some("Brand-new-9".into()),
                new_password2: Some("Brand-new-9".into()),
                uid: Some(uid.into()),
                token: Some(token.into()),
            };
            assert!(matches!(h.auth.confirm_password_reset(input).await, Err(AuthError::InvalidResetLink)));
        }
    }

    #[tokio::test]
    async fn change_password_keeps_current_session_only() {
        let h = memory_harness(test_auth_config());
        let first = registered(&h, "kate", "kate@example.com").await;
        let second = h
            .auth
            .login(LoginInput { username: Some("kate".into()), email: None, password: Some("Str0ng-pass".into()) })
            .await
            .unwrap();

        let mismatch = PasswordChangeInput { new_password1: Some("Another-1x".into()), new_password2: Some("Another-2x".into()) };
        let errs = field_errors(h.auth.change_password(&first.user, None, mismatch).await.unwrap_err());
        assert_eq!(errs.get("new_password2").unwrap(), [MSG_NEW_PASSWORD_MISMATCH]);

        let ok = PasswordChangeInput { new_password1: Some("Another-1x".into()), new_password2: Some("Another-1x".into()) };
        h.auth.change_password(&first.user, Some(&second.session.key), ok).await.unwrap();
        assert!(h.auth.authenticate_session(&second.session.key).await.unwrap().is_some());
        assert!(h.auth.authenticate_session(&first.session.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_drops_token_and_session() {
        let h = memory_harness(test_auth_config());
        let s = registered(&h, "liam", "liam@example.com").await;
        h.auth.logout(Some(&s.user), Some(&s.session.key)).await.unwrap();
        assert!(matches!(h.auth.authenticate_token(&s.token).await, Err(AuthError::InvalidToken)));
        assert!(h.auth.authenticate_session(&s.session.key).await.unwrap().is_none());
        h.auth.logout(None, None).await.unwrap();
    }

    #[tokio::test]
    async fn expired_session_is_anonymous() {
        let h = memory_harness(test_auth_config());
        let s = registered(&h, "mia", "mia@example.com").await;
        h.store.set_session_expiry(&s.session.key, Utc::now() - Duration::seconds(1)).await;
        assert!(h.auth.authenticate_session(&s.session.key).await.unwrap().is_none());
        assert_eq!(h.store.session_count(s.user.id).await, 1);
    }

    #[tokio::test]
    async fn login_purges_expired_sessions() {
        let h = memory_harness(test_auth_config());
        let first = registered(&h, "pia", "pia@example.com").await;
        let login = || LoginInput { username: Some("pia".into()), email: None, password: Some("Str0ng-pass".into()) };
        let second = h.auth.login(login()).await.unwrap();
        assert_eq!(h.store.session_count(first.user.id).await, 2);

        h.store.set_session_expiry(&first.session.key, Utc::now() - Duration::seconds(1)).await;
        let third = h.auth.login(login()).await.unwrap();
        assert_eq!(h.store.session_count(first.user.id).await, 2);
        assert!(h.auth.authenticate_session(&second.session.key).await.unwrap().is_some());
        assert!(h.auth.authenticate_session(&third.session.key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn user_details_update_rules() {
        let h = memory_harness(test_auth_config());
        registered(&h, "nora", "nora@example.com").await;
        let s = registered(&h, "olga", "olga@example.com").await;

        let errs = field_errors(
            h.auth
                .update_user_details(&s.user, UserDetailsInput { first_name: Some("O".into()), ..Default::default() }, false)
                .await
                .unwrap_err(),
        );
        assert_eq!(errs.get("username").unwrap(), [validate::MSG_REQUIRED]);

        let errs = field_errors(
            h.auth
                .update_user_details(&s.user, UserDetailsInput { username: Some("nora".into()), ..Default::default() }, true)
                .await
                .unwrap_err(),
        );
        assert_eq!(errs.get("username").unwrap(), [MSG_USERNAME_TAKEN]);

        let d = h
            .auth
            .update_user_details(&s.user, UserDetailsInput { last_name: Some("Smith".into()), ..Default::default() }, true)
            .await
            .unwrap();
        assert_eq!(d, UserDetails { pk: s.user.id, username: "olga".into(), email: "olga@example.com".into(), first_name: "".into(), last_name: "Smith".into() });
    }
}
