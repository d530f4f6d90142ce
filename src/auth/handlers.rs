use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, GoogleLoginRequest, LoginRequest, SignupRequest},
        extractors::{Payload, ResponseFormat},
        guard::{require_session, CurrentUser, LOGIN_PATH},
        repo_types::PublicUser,
    },
    error::{AppError, AppResult, Negotiated},
    pages,
    state::AppState,
};

const SIGNUP_PATH: &str = "/auth/signup";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(SIGNUP_PATH, get(pages::signup_page).post(signup))
        .route(LOGIN_PATH, get(pages::login_page).post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/google", post(google_login))
}

/// Routes behind the session guard.
pub fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/auth", get(list_users))
        .route("/auth/", get(list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    format: ResponseFormat,
    payload: Result<Payload<SignupRequest>, AppError>,
) -> Result<Response, Negotiated> {
    let Payload(req) = payload.map_err(|e| e.negotiate(format, SIGNUP_PATH))?;
    let user = state
        .auth
        .signup(req)
        .await
        .map_err(|e| e.negotiate(format, SIGNUP_PATH))?;

    Ok(match format {
        ResponseFormat::Json => (
            StatusCode::CREATED,
            Json(AuthResponse {
                message: "User created successfully",
                user,
            }),
        )
            .into_response(),
        ResponseFormat::Html => Redirect::to(LOGIN_PATH).into_response(),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    format: ResponseFormat,
    payload: Result<Payload<LoginRequest>, AppError>,
) -> Result<Response, Negotiated> {
    let Payload(req) = payload.map_err(|e| e.negotiate(format, LOGIN_PATH))?;
    let issued = state
        .auth
        .login(req)
        .await
        .map_err(|e| e.negotiate(format, LOGIN_PATH))?;
    let cookie = state
        .auth
        .session_cookie()
        .set(&issued.value)
        .map_err(|e| AppError::from(e).negotiate(format, LOGIN_PATH))?;

    Ok(match format {
        ResponseFormat::Json => (
            [(header::SET_COOKIE, cookie)],
            Json(AuthResponse {
                message: "Login successful",
                user: issued.user,
            }),
        )
            .into_response(),
        ResponseFormat::Html => ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response(),
    })
}

/// Called from client script, so success and errors are always JSON.
#[instrument(skip(state, req))]
pub async fn google_login(
    State(state): State<AppState>,
    Payload(req): Payload<GoogleLoginRequest>,
) -> AppResult<Response> {
    let issued = state.auth.google_login(req).await?;
    let cookie = state.auth.session_cookie().set(&issued.value)?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Login successful",
            user: issued.user,
        }),
    )
        .into_response())
}

#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let jar = state.auth.session_cookie();
    let current = jar.read(&headers);
    state.auth.logout(current.as_deref()).await;
    let cleared = jar.clear()?;
    info!(had_session = current.is_some(), "logout");
    Ok(([(header::SET_COOKIE, cleared)], Redirect::to(LOGIN_PATH)).into_response())
}

#[instrument(skip(state, session))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    let users = state.auth.list_users(&session).await?;
    Ok(Json(users))
}
