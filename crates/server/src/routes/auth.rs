use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use common::types::Detail;
use service::auth::domain::{
    AuthUser, LoginInput, PasswordChangeInput, PasswordResetConfirmInput, PasswordResetInput, RegisterInput,
    Registration, ResendEmailInput, UserDetails, UserDetailsInput, VerifyEmailInput,
};
use service::auth::repository::AuthRepository;
use service::auth::AuthService;
use service::pagination::PageSettings;
use service::polls::repository::PollRepository;
use service::polls::PollService;

use crate::errors::ApiError;
use crate::extract::Payload;

pub const SESSION_COOKIE: &str = "sessionid";

const MSG_NO_CREDENTIALS: &str = "Invalid token header. No credentials provided.";
const MSG_TOKEN_SPACES: &str = "Invalid token header. Token string should not contain spaces.";
const MSG_TOKEN_CHARS: &str = "Invalid token header. Token string should not contain invalid characters.";

/// Shared handler state; both services sit behind trait objects so the store is chosen at startup.
#[derive(Clone)]
pub struct ServerState {
    pub auth: Arc<AuthService<dyn AuthRepository>>,
    pub polls: Arc<PollService<dyn PollRepository>>,
    pub pages: PageSettings,
    /// Scheme and authority for absolute links; the Host header is used when unset.
    pub public_url: Option<String>,
}

/// Who is calling, resolved once per request by [`resolve_identity`].
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user: Option<AuthUser>,
    pub session_key: Option<String>,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}

/// An authenticated caller; anonymous requests are rejected with 403.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(|i| i.user.clone())
            .map(CurrentUser)
            .ok_or(ApiError::NotAuthenticated)
    }
}

/// The key from `Authorization: Token <key>`; any other scheme is not ours to judge.
fn token_credentials(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(raw) = headers.get(AUTHORIZATION) else { return Ok(None) };
    let raw = raw.to_str().map_err(|_| ApiError::AuthenticationFailed(MSG_TOKEN_CHARS.into()))?;
    let mut parts = raw.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("token") => {}
        _ => return Ok(None),
    }
    let key = parts.next().ok_or_else(|| ApiError::AuthenticationFailed(MSG_NO_CREDENTIALS.into()))?;
    if parts.next().is_some() {
        return Err(ApiError::AuthenticationFailed(MSG_TOKEN_SPACES.into()));
    }
    Ok(Some(key.to_string()))
}

/// Token header first, then the session cookie. A bad token fails the request outright.
pub async fn resolve_identity(
    State(state): State<ServerState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session_key = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()).filter(|k| !k.is_empty());
    let user = match token_credentials(req.headers())? {
        Some(key) => Some(state.auth.authenticate_token(&key).await?),
        None => match session_key.as_deref() {
            Some(key) => state.auth.authenticate_session(key).await?,
            None => None,
        },
    };
    debug!(user_id = user.as_ref().map(|u| u.id), "identity_resolved");
    req.extensions_mut().insert(Identity { user, session_key });
    Ok(next.run(req).await)
}

fn session_cookie(key: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, key);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenBody {
    pub key: String,
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/login/", tag = "auth",
    request_body = crate::openapi::LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenBody),
        (status = 400, description = "Invalid credentials"),
        (status = 403, description = "Invalid token header")
    )
)]
pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    Payload(input): Payload<LoginInput>,
) -> Result<(CookieJar, Json<TokenBody>), ApiError> {
    let session = state.auth.login(input).await?;
    let jar = jar.add(session_cookie(session.session.key));
    Ok((jar, Json(TokenBody { key: session.token })))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/logout/", tag = "auth",
    responses((status = 200, description = "Logged out", body = Detail))
)]
pub async fn logout(
    State(state): State<ServerState>,
    identity: Identity,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Detail>), ApiError> {
    state.auth.logout(identity.user.as_ref(), identity.session_key.as_deref()).await?;
    let jar = jar.remove(session_cookie(String::new()));
    Ok((jar, Json(Detail::new("Successfully logged out."))))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/password/change/", tag = "auth",
    request_body = crate::openapi::PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = Detail),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn password_change(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    identity: Identity,
    Payload(input): Payload<PasswordChangeInput>,
) -> Result<Json<Detail>, ApiError> {
    state.auth.change_password(&user, identity.session_key.as_deref(), input).await?;
    Ok(Json(Detail::new("New password has been saved.")))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/password/reset/", tag = "auth",
    request_body = crate::openapi::PasswordResetRequest,
    responses(
        (status = 200, description = "Reset mail sent when the account exists", body = Detail),
        (status = 400, description = "Malformed email")
    )
)]
pub async fn password_reset(
    State(state): State<ServerState>,
    Payload(input): Payload<PasswordResetInput>,
) -> Result<Json<Detail>, ApiError> {
    state.auth.request_password_reset(input).await?;
    Ok(Json(Detail::new("Password reset e-mail has been sent.")))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/password/reset/confirm/", tag = "auth",
    request_body = crate::openapi::PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset", body = Detail),
        (status = 400, description = "Invalid link or password")
    )
)]
pub async fn password_reset_confirm(
    State(state): State<ServerState>,
    Payload(input): Payload<PasswordResetConfirmInput>,
) -> Result<Json<Detail>, ApiError> {
    state.auth.confirm_password_reset(input).await?;
    Ok(Json(Detail::new("Password has been reset with the new password.")))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/registration/", tag = "auth",
    request_body = crate::openapi::RegisterRequest,
    responses(
        (status = 201, description = "Registered; token issued, or verification mail sent", body = TokenBody),
        (status = 400, description = "Validation error")
    )
)]
pub async fn register(
    State(state): State<ServerState>,
    jar: CookieJar,
    Payload(input): Payload<RegisterInput>,
) -> Result<Response, ApiError> {
    let resp = match state.auth.register(input).await? {
        Registration::Issued(session) => {
            let jar = jar.add(session_cookie(session.session.key));
            (StatusCode::CREATED, jar, Json(TokenBody { key: session.token })).into_response()
        }
        Registration::VerificationSent(_) => {
            (StatusCode::CREATED, Json(Detail::new("Verification e-mail sent."))).into_response()
        }
    };
    Ok(resp)
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/registration/resend-email/", tag = "auth",
    request_body = crate::openapi::ResendEmailRequest,
    responses((status = 201, description = "Accepted", body = Detail))
)]
pub async fn resend_email(
    State(state): State<ServerState>,
    Payload(input): Payload<ResendEmailInput>,
) -> Result<(StatusCode, Json<Detail>), ApiError> {
    state.auth.resend_verification(input).await?;
    Ok((StatusCode::CREATED, Json(Detail::new("ok"))))
}

#[utoipa::path(
    post, path = "/api/v1/dj-rest-auth/registration/verify-email/", tag = "auth",
    request_body = crate::openapi::VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = Detail),
        (status = 404, description = "Unknown key")
    )
)]
pub async fn verify_email(
    State(state): State<ServerState>,
    Payload(input): Payload<VerifyEmailInput>,
) -> Result<Json<Detail>, ApiError> {
    state.auth.verify_email(input).await?;
    Ok(Json(Detail::new("ok")))
}

#[utoipa::path(
    get, path = "/api/v1/dj-rest-auth/user/", tag = "auth",
    responses(
        (status = 200, description = "Current user", body = crate::openapi::UserDetailsDoc),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn user_details(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
) -> Json<UserDetails> {
    Json(state.auth.user_details(&user))
}

#[utoipa::path(
    put, path = "/api/v1/dj-rest-auth/user/", tag = "auth",
    request_body = crate::openapi::UserDetailsRequest,
    responses(
        (status = 200, description = "Updated", body = crate::openapi::UserDetailsDoc),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn user_details_update(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Payload(input): Payload<UserDetailsInput>,
) -> Result<Json<UserDetails>, ApiError> {
    Ok(Json(state.auth.update_user_details(&user, input, false).await?))
}

#[utoipa::path(
    patch, path = "/api/v1/dj-rest-auth/user/", tag = "auth",
    request_body = crate::openapi::UserDetailsRequest,
    responses(
        (status = 200, description = "Updated", body = crate::openapi::UserDetailsDoc),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn user_details_partial_update(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Payload(input): Payload<UserDetailsInput>,
) -> Result<Json<UserDetails>, ApiError> {
    Ok(Json(state.auth.update_user_details(&user, input, true).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authz: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(authz).unwrap());
        h
    }

    #[test]
    fn parses_token_header() {
        assert_eq!(token_credentials(&HeaderMap::new()).unwrap(), None);
        assert_eq!(token_credentials(&headers("Token abc")).unwrap(), Some("abc".into()));
        assert_eq!(token_credentials(&headers("token abc")).unwrap(), Some("abc".into()));
        assert_eq!(token_credentials(&headers("Bearer abc")).unwrap(), None);
        assert!(matches!(token_credentials(&headers("Token")), Err(ApiError::AuthenticationFailed(m)) if m == MSG_NO_CREDENTIALS));
        assert!(matches!(token_credentials(&headers("Token a b")), Err(ApiError::AuthenticationFailed(m)) if m == MSG_TOKEN_SPACES));
    }
}
