use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header::HOST, HeaderMap, StatusCode, Uri},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use common::pagination::Paginated;
use service::pagination::{Paged, Pagination};
use service::polls::domain::{Choice, Question, QuestionInput, Vote, VoteInput};

use crate::errors::ApiError;
use crate::extract::Payload;
use crate::routes::auth::{CurrentUser, ServerState};

#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionOut {
    pub id: i32,
    pub url: String,
    /// pk of the user who created the question
    pub author: i32,
    pub question_text: String,
    pub date_published: DateTime<Utc>,
    pub date_created: DateTime<Utc>,
}

impl From<Question> for QuestionOut {
    fn from(q: Question) -> Self {
        Self {
            url: format!("/api/v1/polls/{}/", q.id),
            id: q.id,
            author: q.author_id,
            question_text: q.question_text,
            date_published: q.date_published,
            date_created: q.date_created,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChoiceOut {
    pub id: i32,
    pub url: String,
    pub choice_text: String,
    pub vote_count: i64,
}

impl From<Choice> for ChoiceOut {
    fn from(c: Choice) -> Self {
        Self {
            url: format!("/api/v1/polls/{}/choices/{}/", c.question_id, c.id),
            id: c.id,
            choice_text: c.choice_text,
            vote_count: c.vote_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteOut {
    pub id: i32,
    pub voter_username: String,
}

impl From<Vote> for VoteOut {
    fn from(v: Vote) -> Self {
        Self { id: v.id, voter_username: v.displayed_voter().to_string() }
    }
}

/// Kept as raw strings so malformed values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Number of results to return per page.
    pub limit: Option<String>,
    /// The initial index from which to return the results.
    pub offset: Option<String>,
}

fn parse_pk(raw: &str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// Absolute URL of the current request, used as the base for `next`/`previous`.
fn request_url(state: &ServerState, headers: &HeaderMap, uri: &Uri) -> Result<Url, ApiError> {
    let base = match &state.public_url {
        Some(public) => public.clone(),
        None => {
            let host = headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .or_else(|| uri.authority().map(|a| a.to_string()))
                .unwrap_or_else(|| "localhost".to_string());
            format!("http://{host}")
        }
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    Url::parse(&format!("{base}{path}")).map_err(|e| ApiError::BadRequest(format!("Invalid request URL: {e}")))
}

struct PageRequest {
    url: Url,
    page: Pagination,
}

impl PageRequest {
    fn new(state: &ServerState, query: &PageQuery, headers: &HeaderMap, uri: &Uri) -> Result<Self, ApiError> {
        Ok(Self {
            url: request_url(state, headers, uri)?,
            page: Pagination::from_query(query.limit.as_deref(), query.offset.as_deref(), state.pages),
        })
    }

    fn wrap<T, U: From<T>>(&self, paged: Paged<T>) -> Paginated<U> {
        let results = paged.items.into_iter().map(U::from).collect();
        Paginated::new(&self.url, paged.count, self.page.limit, self.page.offset, results)
    }
}

#[utoipa::path(
    get, path = "/api/v1/polls/", tag = "polls",
    params(PageQuery),
    responses(
        (status = 200, description = "Published questions, newest first", body = crate::openapi::QuestionPage),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn list_questions(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Paginated<QuestionOut>>, ApiError> {
    let req = PageRequest::new(&state, &query, &headers, &uri)?;
    let paged = state.polls.list_questions(req.page).await?;
    Ok(Json(req.wrap(paged)))
}

#[utoipa::path(
    post, path = "/api/v1/polls/", tag = "polls",
    request_body = crate::openapi::QuestionRequest,
    responses(
        (status = 201, description = "Created", body = QuestionOut),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not authenticated")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn create_question(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Payload(input): Payload<QuestionInput>,
) -> Result<(StatusCode, Json<QuestionOut>), ApiError> {
    let question = state.polls.create_question(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(question.into())))
}

#[utoipa::path(
    get, path = "/api/v1/polls/{question_pk}/", tag = "polls",
    params(("question_pk" = i32, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question", body = QuestionOut),
        (status = 404, description = "Unknown or unpublished question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn get_question(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path(question_pk): Path<String>,
) -> Result<Json<QuestionOut>, ApiError> {
    let question = state.polls.get_question(parse_pk(&question_pk)?).await?;
    Ok(Json(question.into()))
}

#[utoipa::path(
    delete, path = "/api/v1/polls/{question_pk}/", tag = "polls",
    params(("question_pk" = i32, Path, description = "Question id")),
    responses(
        (status = 204, description = "Deleted with its choices and votes"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Unknown or unpublished question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn delete_question(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Path(question_pk): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.polls.delete_question(user.id, parse_pk(&question_pk)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get, path = "/api/v1/polls/{question_pk}/choices/", tag = "polls",
    params(("question_pk" = i32, Path, description = "Question id"), PageQuery),
    responses(
        (status = 200, description = "Choices with live vote counts", body = crate::openapi::ChoicePage),
        (status = 404, description = "Unknown or unpublished question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn list_choices(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path(question_pk): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Paginated<ChoiceOut>>, ApiError> {
    let req = PageRequest::new(&state, &query, &headers, &uri)?;
    let paged = state.polls.list_choices(parse_pk(&question_pk)?, req.page).await?;
    Ok(Json(req.wrap(paged)))
}

#[utoipa::path(
    get, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id")
    ),
    responses(
        (status = 200, description = "Choice", body = ChoiceOut),
        (status = 404, description = "Not found under this question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn get_choice(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path((question_pk, choice_pk)): Path<(String, String)>,
) -> Result<Json<ChoiceOut>, ApiError> {
    let choice = state.polls.get_choice(parse_pk(&question_pk)?, parse_pk(&choice_pk)?).await?;
    Ok(Json(choice.into()))
}

#[utoipa::path(
    get, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Votes on the choice", body = crate::openapi::VotePage),
        (status = 404, description = "Not found under this question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn list_votes(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path((question_pk, choice_pk)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Paginated<VoteOut>>, ApiError> {
    let req = PageRequest::new(&state, &query, &headers, &uri)?;
    let paged = state
        .polls
        .list_votes(parse_pk(&question_pk)?, parse_pk(&choice_pk)?, req.page)
        .await?;
    Ok(Json(req.wrap(paged)))
}

#[utoipa::path(
    post, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id")
    ),
    request_body = crate::openapi::VoteRequest,
    responses(
        (status = 201, description = "Vote cast", body = VoteOut),
        (status = 400, description = "Foreign choice or multiple voting"),
        (status = 404, description = "Not found under this question")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn create_vote(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Path((question_pk, choice_pk)): Path<(String, String)>,
    Payload(input): Payload<VoteInput>,
) -> Result<(StatusCode, Json<VoteOut>), ApiError> {
    let vote = state
        .polls
        .create_vote(user.id, parse_pk(&question_pk)?, parse_pk(&choice_pk)?, input)
        .await?;
    Ok((StatusCode::CREATED, Json(vote.into())))
}

#[utoipa::path(
    get, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/{vote_pk}/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id"),
        ("vote_pk" = i32, Path, description = "Vote id")
    ),
    responses(
        (status = 200, description = "Vote", body = VoteOut),
        (status = 403, description = "Not the voter"),
        (status = 404, description = "Not found under this choice")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn get_vote(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Path((question_pk, choice_pk, vote_pk)): Path<(String, String, String)>,
) -> Result<Json<VoteOut>, ApiError> {
    let vote = state
        .polls
        .get_vote(user.id, parse_pk(&question_pk)?, parse_pk(&choice_pk)?, parse_pk(&vote_pk)?)
        .await?;
    Ok(Json(vote.into()))
}

async fn update_vote(
    state: ServerState,
    user: CurrentUser,
    path: (String, String, String),
    input: VoteInput,
    partial: bool,
) -> Result<Json<VoteOut>, ApiError> {
    let (question_pk, choice_pk, vote_pk) = path;
    let vote = state
        .polls
        .update_vote(
            user.0.id,
            parse_pk(&question_pk)?,
            parse_pk(&choice_pk)?,
            parse_pk(&vote_pk)?,
            input,
            partial,
        )
        .await?;
    Ok(Json(vote.into()))
}

#[utoipa::path(
    put, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/{vote_pk}/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id"),
        ("vote_pk" = i32, Path, description = "Vote id")
    ),
    request_body = crate::openapi::VoteRequest,
    responses(
        (status = 200, description = "Vote replaced; hide_voter is required", body = VoteOut),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the voter")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn replace_vote(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(path): Path<(String, String, String)>,
    Payload(input): Payload<VoteInput>,
) -> Result<Json<VoteOut>, ApiError> {
    update_vote(state, user, path, input, false).await
}

#[utoipa::path(
    patch, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/{vote_pk}/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id"),
        ("vote_pk" = i32, Path, description = "Vote id")
    ),
    request_body = crate::openapi::VoteRequest,
    responses(
        (status = 200, description = "Vote updated", body = VoteOut),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the voter")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn patch_vote(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(path): Path<(String, String, String)>,
    Payload(input): Payload<VoteInput>,
) -> Result<Json<VoteOut>, ApiError> {
    update_vote(state, user, path, input, true).await
}

#[utoipa::path(
    delete, path = "/api/v1/polls/{question_pk}/choices/{choice_pk}/votes/{vote_pk}/", tag = "polls",
    params(
        ("question_pk" = i32, Path, description = "Question id"),
        ("choice_pk" = i32, Path, description = "Choice id"),
        ("vote_pk" = i32, Path, description = "Vote id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the voter"),
        (status = 404, description = "Not found under this choice")
    ),
    security(("cookieAuth" = []), ("tokenAuth" = []))
)]
pub async fn delete_vote(
    State(state): State<ServerState>,
    CurrentUser(user): CurrentUser,
    Path((question_pk, choice_pk, vote_pk)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .polls
        .delete_vote(user.id, parse_pk(&question_pk)?, parse_pk(&choice_pk)?, parse_pk(&vote_pk)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
