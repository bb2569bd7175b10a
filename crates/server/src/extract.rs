//! Request body extractor accepting JSON, urlencoded forms and multipart text fields.

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, Method},
    Form,
};
use serde::de::DeserializeOwned;

use crate::errors::ApiError;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Deserialized request body. An empty body is read as `{}`; unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

fn media_type(req: &Request) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { bytes };
    serde_json::from_slice(bytes).map_err(|e| ApiError::BadRequest(format!("JSON parse error - {e}")))
}

async fn parse_form<T, S>(req: Request, state: &S) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    Form::<T>::from_request(req, state)
        .await
        .map(|Form(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Text parts re-encoded as an urlencoded body; file parts are skipped.
async fn multipart_as_form(req: Request) -> Result<Request, ApiError> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut pairs: Vec<(String, String)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else { continue };
        if field.file_name().is_some() {
            continue;
        }
        let value = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        pairs.push((name, value));
    }
    // built after the loop: the serializer is not `Send`
    let encoded = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();
    axum::http::Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, FORM_URLENCODED)
        .body(Body::from(encoded))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let media = media_type(&req);
        match media.as_str() {
            FORM_URLENCODED => parse_form(req, state).await.map(Payload),
            "multipart/form-data" => {
                let req = multipart_as_form(req).await?;
                parse_form(req, state).await.map(Payload)
            }
            m if m.is_empty() || m == "application/json" || m.ends_with("+json") => {
                let bytes = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                parse_json(&bytes).map(Payload)
            }
            _ => Err(ApiError::UnsupportedMediaType(media)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service::polls::domain::VoteInput;

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut b = axum::http::Request::builder().method(Method::POST).uri("/");
        if let Some(ct) = content_type {
            b = b.header(CONTENT_TYPE, ct);
        }
        b.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn empty_json_body_is_empty_object() {
        let Payload(v) = Payload::<VoteInput>::from_request(request(Some("application/json"), ""), &()).await.unwrap();
        assert_eq!(v.choice, None);
        assert_eq!(v.hide_voter, None);
    }

    #[tokio::test]
    async fn reads_json_and_form_bodies() {
        let Payload(v) = Payload::<VoteInput>::from_request(
            request(Some("application/json; charset=utf-8"), r#"{"choice": 3, "voter": 99}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(v.choice, Some(3));

        let Payload(v) =
            Payload::<VoteInput>::from_request(request(Some(FORM_URLENCODED), "choice=4&hide_voter=false"), &())
                .await
                .unwrap();
        assert_eq!(v.choice, Some(4));
        assert_eq!(v.hide_voter, Some(false));
    }

    #[tokio::test]
    async fn reads_multipart_text_fields() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"choice\"\r\n\r\n7\r\n--XyZ--\r\n";
        let Payload(v) =
            Payload::<VoteInput>::from_request(request(Some("multipart/form-data; boundary=XyZ"), body), &())
                .await
                .unwrap();
        assert_eq!(v.choice, Some(7));
    }

    fn assert_send<F: Send>(_: &F) {}

    #[tokio::test]
    async fn multipart_future_is_send() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"hide_voter\"\r\n\r\ntrue\r\n--XyZ--\r\n";
        let fut = multipart_as_form(request(Some("multipart/form-data; boundary=XyZ"), body));
        assert_send(&fut);
        let rebuilt = fut.await.unwrap();
        let Payload(v) = Payload::<VoteInput>::from_request(rebuilt, &()).await.unwrap();
        assert_eq!(v.hide_voter, Some(true));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let err = Payload::<VoteInput>::from_request(request(None, "{nope"), &()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m.starts_with("JSON parse error")));

        let err = Payload::<VoteInput>::from_request(request(Some("text/plain"), "x"), &()).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMediaType(m) if m == "text/plain"));
    }
}
