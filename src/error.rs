//! Unified error type for the auth endpoints.
//!
//! Every failure is rendered either as a JSON `{"error": ...}` body or, for
//! browser clients, as a redirect back to a form with `?error=<code>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{
    extractors::ResponseFormat, google::IdentityError, jwt::TokenError, repo::StoreError,
};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Bad credentials or a rejected identity assertion.
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("session token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("identity verification failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("credential store error: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn invalid_credentials() -> Self {
        AppError::Authentication("Invalid credentials".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Authentication(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Identity(e) if e.is_rejection() => StatusCode::UNAUTHORIZED,
            AppError::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code, used in redirect query strings.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "invalid_input",
            AppError::Conflict(_) | AppError::Storage(StoreError::Duplicate(_)) => "email_taken",
            AppError::Authentication(_) | AppError::Identity(_) => "invalid_credentials",
            AppError::Token(_) => "session_expired",
            AppError::Forbidden(_) => "forbidden",
            AppError::Storage(_) | AppError::Internal(_) => "server_error",
        }
    }

    /// Message safe to show to clients. Server-side failures are not echoed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m)
            | AppError::Conflict(m)
            | AppError::Authentication(m)
            | AppError::Forbidden(m) => m.clone(),
            AppError::Token(_) => "Authentication required".into(),
            AppError::Identity(e) if e.is_rejection() => {
                "Failed to authenticate user with Google.".into()
            }
            AppError::Storage(StoreError::Duplicate(_)) => "Email already registered".into(),
            AppError::Identity(_) | AppError::Storage(_) | AppError::Internal(_) => {
                "Internal server error".into()
            }
        }
    }

    /// Pick JSON or redirect rendering for this error.
    pub fn negotiate(self, format: ResponseFormat, form_path: &'static str) -> Negotiated {
        Negotiated {
            error: self,
            format,
            form_path,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        (status, body).into_response()
    }
}

/// An error paired with the client's preferred response format.
#[derive(Debug)]
pub struct Negotiated {
    error: AppError,
    format: ResponseFormat,
    form_path: &'static str,
}

impl IntoResponse for Negotiated {
    fn into_response(self) -> Response {
        match self.format {
            ResponseFormat::Json => self.error.into_response(),
            ResponseFormat::Html => {
                if self.error.status_code().is_server_error() {
                    tracing::error!(error = ?self.error, "request failed");
                }
                let target = format!("{}?error={}", self.form_path, self.error.code());
                Redirect::to(&target).into_response()
            }
        }
    }
}
