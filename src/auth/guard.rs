//! Route protection.
//!
//! `require_session` is layered onto protected routes with
//! `axum::middleware::from_fn_with_state`. Missing or invalid sessions are
//! redirected to the login page rather than answered with 401, so browser
//! navigation lands on the form. Admitted requests carry a `SessionUser` in
//! their extensions, read back with the `CurrentUser` extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use super::{jwt::TokenError, services::SessionUser};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit(SessionUser),
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    Invalid(TokenError),
}

pub async fn guard(state: &AppState, token: Option<&str>) -> Admission {
    let Some(token) = token else {
        return Admission::Deny(DenyReason::NoSession);
    };
    match state.auth.resolve_session(token).await {
        Ok(user) => Admission::Admit(user),
        Err(e) => Admission::Deny(DenyReason::Invalid(e)),
    }
}

pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = state.auth.session_cookie().read(req.headers());
    match guard(&state, token.as_deref()).await {
        Admission::Admit(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Admission::Deny(reason) => {
            debug!(?reason, path = %req.uri().path(), "session denied");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

/// The session admitted by `require_session`.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to(LOGIN_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionMode;
    use uuid::Uuid;

    #[tokio::test]
    async fn absent_token_is_denied() {
        let state = AppState::fake();
        assert_eq!(guard(&state, None).await, Admission::Deny(DenyReason::NoSession));
    }

    #[tokio::test]
    async fn valid_token_is_admitted_with_claims() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = state.auth.keys().sign(user_id, "ada@example.com").unwrap();
        match guard(&state, Some(&token)).await {
            Admission::Admit(user) => {
                assert_eq!(user.user_id, user_id);
                assert_eq!(user.email, "ada@example.com");
            }
            other => panic!("expected admit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tampered_token_is_denied() {
        let state = AppState::fake();
        let token = state.auth.keys().sign(Uuid::new_v4(), "ada@example.com").unwrap();
        let tampered = format!("{token}x");
        assert!(matches!(
            guard(&state, Some(&tampered)).await,
            Admission::Deny(DenyReason::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn registry_mode_rejects_unknown_ids() {
        let state = AppState::fake_with(|c| c.session_mode = SessionMode::Registry);
        let unknown = Uuid::new_v4().to_string();
        assert_eq!(
            guard(&state, Some(&unknown)).await,
            Admission::Deny(DenyReason::Invalid(TokenError::Expired))
        );
        assert_eq!(
            guard(&state, Some("not-a-uuid")).await,
            Admission::Deny(DenyReason::Invalid(TokenError::Malformed))
        );
    }
}
