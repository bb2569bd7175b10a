use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use models::errors::ModelError;
use serde_json::json;
use service::auth::errors::AuthError;
use service::errors::{FieldErrors, ServiceError};
use thiserror::Error;
use tracing::{error, warn};

pub const MSG_NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const MSG_INVALID_TOKEN: &str = "Invalid token.";
pub const MSG_INACTIVE_USER: &str = "User inactive or deleted.";
pub const MSG_PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const MSG_NOT_FOUND: &str = "Not found.";
pub const MSG_INVALID_RESET_LINK: &str = "Invalid password reset link.";
pub const MSG_SERVER_ERROR: &str = "A server error occurred.";

/// Every failure the HTTP surface reports, rendered as a DRF-style JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("permission denied")]
    PermissionDenied,
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated | ApiError::AuthenticationFailed(_) | ApiError::PermissionDenied => {
                StatusCode::FORBIDDEN
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::NotAuthenticated => json!({ "detail": MSG_NOT_AUTHENTICATED }),
            ApiError::AuthenticationFailed(detail) | ApiError::BadRequest(detail) => json!({ "detail": detail }),
            ApiError::PermissionDenied => json!({ "detail": MSG_PERMISSION_DENIED }),
            ApiError::NotFound => json!({ "detail": MSG_NOT_FOUND }),
            ApiError::Validation(errs) => json!(errs),
            ApiError::UnsupportedMediaType(media) => {
                json!({ "detail": format!("Unsupported media type \"{media}\" in request.") })
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                json!({ "detail": MSG_SERVER_ERROR })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errs: FieldErrors) -> Self {
        ApiError::Validation(errs)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(errs) => ApiError::Validation(errs),
            AuthError::InvalidToken => ApiError::AuthenticationFailed(MSG_INVALID_TOKEN.into()),
            AuthError::InactiveUser => ApiError::AuthenticationFailed(MSG_INACTIVE_USER.into()),
            AuthError::InvalidResetLink => ApiError::BadRequest(MSG_INVALID_RESET_LINK.into()),
            AuthError::NotFound => ApiError::NotFound,
            other => {
                warn!(code = other.code(), "auth operation failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(errs) => ApiError::Validation(errs),
            ServiceError::NotFound(_) => ApiError::NotFound,
            ServiceError::PermissionDenied => ApiError::PermissionDenied,
            ServiceError::Model(ModelError::Validation(msg)) => ApiError::Validation(FieldErrors::non_field(msg)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database unavailable: {0}")]
    Database(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
