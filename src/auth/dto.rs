use serde::{Deserialize, Serialize};

use super::repo_types::PublicUser;

/// Request body for signup. Fields are optional so that missing ones surface
/// as validation errors rather than decode failures.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Response for signup, login and google login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: PublicUser,
}
