#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use configs::EmailVerification;
use serde_json::{json, Value};
use tower::ServiceExt;

use server::routes::auth::ServerState;
use service::auth::mailer::{EmailKind, RecordingMailer};
use service::auth::password::HashCost;
use service::auth::repository::AuthRepository;
use service::auth::{AuthConfig, AuthService};
use service::memory::MemoryStore;
use service::pagination::PageSettings;
use service::polls::repository::PollRepository;
use service::polls::PollService;

pub const PASSWORD: &str = "Str0ng-pass";
pub const HOST: &str = "testserver";

pub enum Auth<'a> {
    Anonymous,
    Token(&'a str),
    Session(&'a str),
}

pub struct Resp {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Resp {
    /// Value of the `sessionid` cookie set by this response, if any.
    pub fn session(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.strip_prefix("sessionid="))
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
            .filter(|v| !v.is_empty())
    }
}

pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    pub store: Arc<MemoryStore>,
}

pub fn app() -> TestApp {
    app_with(EmailVerification::Optional)
}

pub fn app_with(verification: EmailVerification) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let mut cfg = AuthConfig::new("test-secret");
    cfg.hash_cost = HashCost { memory_kib: 8, iterations: 1 };
    cfg.email_verification = verification;

    let auth_repo: Arc<dyn AuthRepository> = store.clone();
    let poll_repo: Arc<dyn PollRepository> = store.clone();
    let state = ServerState {
        auth: Arc::new(AuthService::new(auth_repo, mailer.clone(), cfg)),
        polls: Arc::new(PollService::new(poll_repo)),
        pages: PageSettings::default(),
        public_url: None,
    };
    TestApp { router: server::startup::build_app(state), mailer, store }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, auth: Auth<'_>, body: Option<Value>) -> Resp {
        let mut req = Request::builder().method(method).uri(uri).header(header::HOST, HOST);
        match auth {
            Auth::Anonymous => {}
            Auth::Token(key) => req = req.header(header::AUTHORIZATION, format!("Token {key}")),
            Auth::Session(key) => req = req.header(header::COOKIE, format!("sessionid={key}")),
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        self.dispatch(req.body(body).unwrap()).await
    }

    pub async fn send_raw(&self, req: Request<Body>) -> Resp {
        self.dispatch(req).await
    }

    async fn dispatch(&self, req: Request<Body>) -> Resp {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Resp { status, headers, body }
    }

    pub async fn get(&self, uri: &str, auth: Auth<'_>) -> Resp {
        self.send("GET", uri, auth, None).await
    }

    pub async fn post(&self, uri: &str, auth: Auth<'_>, body: Value) -> Resp {
        self.send("POST", uri, auth, Some(body)).await
    }

    /// Registers `username` (with `<username>@example.com`) and returns its token.
    pub async fn register(&self, username: &str) -> String {
        let resp = self
            .post(
                "/api/v1/dj-rest-auth/registration/",
                Auth::Anonymous,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password1": PASSWORD,
                    "password2": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        resp.body["key"].as_str().unwrap().to_string()
    }

    pub async fn create_question(&self, token: &str, text: &str, choices: &[&str]) -> Value {
        let choices: Vec<Value> = choices.iter().map(|c| json!({ "choice_text": c })).collect();
        let resp = self
            .post(
                "/api/v1/polls/",
                Auth::Token(token),
                json!({
                    "question_text": text,
                    "date_published": "2024-01-01T00:00:00Z",
                    "choices": choices,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        resp.body
    }

    /// Choice ids of a question in insertion order.
    pub async fn choice_ids(&self, token: &str, question_id: i64) -> Vec<i64> {
        let resp = self.get(&format!("/api/v1/polls/{question_id}/choices/"), Auth::Token(token)).await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        resp.body["results"].as_array().unwrap().iter().map(|c| c["id"].as_i64().unwrap()).collect()
    }

    pub async fn reset_link(&self, email: &str) -> Option<(String, String)> {
        match self.mailer.last_to(email).await?.kind {
            EmailKind::PasswordReset { uid, token } => Some((uid, token)),
            EmailKind::EmailVerification { .. } => None,
        }
    }

    pub async fn verification_key(&self, email: &str) -> Option<String> {
        match self.mailer.last_to(email).await?.kind {
            EmailKind::EmailVerification { key } => Some(key),
            EmailKind::PasswordReset { .. } => None,
        }
    }
}
