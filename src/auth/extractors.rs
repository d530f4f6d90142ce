use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// How the client wants results rendered, from its `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    /// Browser navigation: results become redirects.
    Html,
}

impl ResponseFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("application/json"));
        if wants_json {
            ResponseFormat::Json
        } else {
            ResponseFormat::Html
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ResponseFormat
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ResponseFormat::from_headers(&parts.headers))
    }
}

/// Request body accepted as JSON or as an urlencoded form.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(format!("Invalid JSON body: {}", e.body_text())))?;
            Ok(Payload(body))
        } else {
            let Form(body) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(format!("Invalid form body: {}", e.body_text())))?;
            Ok(Payload(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderValue};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body2 {
        email: Option<String>,
    }

    #[test]
    fn accept_header_selects_format() {
        let mut headers = HeaderMap::new();
        assert_eq!(ResponseFormat::from_headers(&headers), ResponseFormat::Html);
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,application/json;q=0.9"));
        assert_eq!(ResponseFormat::from_headers(&headers), ResponseFormat::Json);
    }

    #[tokio::test]
    async fn payload_reads_json_and_form() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"ada@example.com"}"#))
            .unwrap();
        let Payload(b) = Payload::<Body2>::from_request(req, &()).await.unwrap();
        assert_eq!(b.email.as_deref(), Some("ada@example.com"));

        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=ada%40example.com"))
            .unwrap();
        let Payload(b) = Payload::<Body2>::from_request(req, &()).await.unwrap();
        assert_eq!(b.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn broken_json_is_a_validation_error() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let err = Payload::<Body2>::from_request(req, &()).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
