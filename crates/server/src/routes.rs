pub mod auth;
pub mod polls;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;

use crate::openapi::ApiDoc;
use auth::ServerState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = Health)))]
pub async fn health() -> Json<Health> {
    Json(Health::ok())
}

/// Build the full application router: health, API docs and everything under `/api/v1/`.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let auth_routes = Router::new()
        .route("/api/v1/dj-rest-auth/login/", post(auth::login))
        .route("/api/v1/dj-rest-auth/logout/", post(auth::logout))
        .route("/api/v1/dj-rest-auth/password/change/", post(auth::password_change))
        .route("/api/v1/dj-rest-auth/password/reset/", post(auth::password_reset))
        .route("/api/v1/dj-rest-auth/password/reset/confirm/", post(auth::password_reset_confirm))
        .route("/api/v1/dj-rest-auth/registration/", post(auth::register))
        .route("/api/v1/dj-rest-auth/registration/resend-email/", post(auth::resend_email))
        .route("/api/v1/dj-rest-auth/registration/verify-email/", post(auth::verify_email))
        .route(
            "/api/v1/dj-rest-auth/user/",
            get(auth::user_details)
                .put(auth::user_details_update)
                .patch(auth::user_details_partial_update),
        );

    // path params keep one name per segment across routes
    let poll_routes = Router::new()
        .route("/api/v1/polls/", get(polls::list_questions).post(polls::create_question))
        .route(
            "/api/v1/polls/:question_pk/",
            get(polls::get_question).delete(polls::delete_question),
        )
        .route("/api/v1/polls/:question_pk/choices/", get(polls::list_choices))
        .route("/api/v1/polls/:question_pk/choices/:choice_pk/", get(polls::get_choice))
        .route(
            "/api/v1/polls/:question_pk/choices/:choice_pk/votes/",
            get(polls::list_votes).post(polls::create_vote),
        )
        .route(
            "/api/v1/polls/:question_pk/choices/:choice_pk/votes/:vote_pk/",
            get(polls::get_vote)
                .put(polls::replace_vote)
                .patch(polls::patch_vote)
                .delete(polls::delete_vote),
        );

    let api = auth_routes
        .merge(poll_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::resolve_identity));

    Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/api/v1/docs").url("/api/v1/schema/", ApiDoc::openapi()))
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
