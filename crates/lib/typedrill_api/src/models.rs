//! Wire models for the HTTP API.
//!
//! All bodies are camelCase JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use typedrill_core::auth::workflow::{AuthenticatedSession, GuestSession};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Response for login, registration, and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub login_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthenticatedSession> for TokenResponse {
    fn from(session: AuthenticatedSession) -> Self {
        Self {
            user_id: session.user_id,
            login_id: session.login_id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Response for guest sessions: an access token only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSessionResponse {
    pub user_id: Uuid,
    pub login_id: String,
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<GuestSession> for GuestSessionResponse {
    fn from(session: GuestSession) -> Self {
        Self {
            user_id: session.user_id,
            login_id: session.login_id,
            access_token: session.access_token,
            expires_in: session.expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub db_connected: bool,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
