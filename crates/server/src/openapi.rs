use chrono::{DateTime, Utc};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use common::types::{Detail, Health};

use crate::routes::auth::TokenBody;
use crate::routes::polls::{ChoiceOut, QuestionOut, VoteOut};

#[derive(ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    /// Required when email verification is mandatory.
    pub email: Option<String>,
    pub password1: String,
    pub password2: String,
}

#[derive(ToSchema)]
pub struct PasswordChangeRequest {
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub new_password1: String,
    pub new_password2: String,
    pub uid: String,
    pub token: String,
}

#[derive(ToSchema)]
pub struct VerifyEmailRequest {
    pub key: String,
}

#[derive(ToSchema)]
pub struct ResendEmailRequest {
    pub email: String,
}

#[derive(ToSchema)]
pub struct UserDetailsRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(ToSchema)]
pub struct UserDetailsDoc {
    pub pk: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(ToSchema)]
pub struct ChoiceRequest {
    pub choice_text: String,
}

#[derive(ToSchema)]
pub struct QuestionRequest {
    pub question_text: String,
    pub date_published: DateTime<Utc>,
    /// Between 2 and 20 distinct choices.
    pub choices: Vec<ChoiceRequest>,
}

#[derive(ToSchema)]
pub struct VoteRequest {
    /// Defaults to the choice in the path; must belong to the same question.
    pub choice: Option<i32>,
    pub hide_voter: Option<bool>,
}

#[derive(ToSchema)]
pub struct QuestionPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<QuestionOut>,
}

#[derive(ToSchema)]
pub struct ChoicePage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<ChoiceOut>,
}

#[derive(ToSchema)]
pub struct VotePage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<VoteOut>,
}

/// Registers the `sessionid` cookie and `Authorization: Token` schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(utoipa::openapi::Components::default);
        components.add_security_scheme(
            "cookieAuth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("sessionid"))),
        );
        components.add_security_scheme(
            "tokenAuth",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "Authorization",
                "Token-based authentication with required prefix \"Token\"",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(title = "Polls API", version = "1.0.0"),
    paths(
        crate::routes::health,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::password_change,
        crate::routes::auth::password_reset,
        crate::routes::auth::password_reset_confirm,
        crate::routes::auth::register,
        crate::routes::auth::resend_email,
        crate::routes::auth::verify_email,
        crate::routes::auth::user_details,
        crate::routes::auth::user_details_update,
        crate::routes::auth::user_details_partial_update,
        crate::routes::polls::list_questions,
        crate::routes::polls::create_question,
        crate::routes::polls::get_question,
        crate::routes::polls::delete_question,
        crate::routes::polls::list_choices,
        crate::routes::polls::get_choice,
        crate::routes::polls::list_votes,
        crate::routes::polls::create_vote,
        crate::routes::polls::get_vote,
        crate::routes::polls::replace_vote,
        crate::routes::polls::patch_vote,
        crate::routes::polls::delete_vote,
    ),
    components(
        schemas(
            Health,
            Detail,
            TokenBody,
            LoginRequest,
            RegisterRequest,
            PasswordChangeRequest,
            PasswordResetRequest,
            PasswordResetConfirmRequest,
            VerifyEmailRequest,
            ResendEmailRequest,
            UserDetailsRequest,
            UserDetailsDoc,
            ChoiceRequest,
            QuestionRequest,
            VoteRequest,
            QuestionOut,
            ChoiceOut,
            VoteOut,
            QuestionPage,
            ChoicePage,
            VotePage,
        )
    ),
    tags(
        (name = "health"),
        (name = "auth"),
        (name = "polls")
    )
)]
pub struct ApiDoc;
