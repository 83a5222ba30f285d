//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    GuestSessionResponse, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    TokenResponse,
};

/// `POST /auth/login`: authenticate with login id + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let session = state.auth.login(&body.login_id, &body.password).await?;
    Ok(Json(session.into()))
}

/// `POST /auth/register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let session = state.auth.register(&body.login_id, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// `POST /auth/refresh`: exchange a refresh token for a rotated pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let session = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(session.into()))
}

/// `POST /auth/logout`: revoke a refresh token. Unknown tokens succeed.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<StatusCode> {
    if let Some(token) = body.refresh_token.as_deref() {
        state.auth.logout(token).await?;
    }
    Ok(StatusCode::OK)
}

/// `POST /auth/logout-all`: revoke every refresh token owned by the caller.
/// Requires authentication.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<StatusCode> {
    let user_id = user
        .0
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Invalid token subject".into()))?;
    state.auth.logout_all(user_id).await?;
    Ok(StatusCode::OK)
}

/// `POST /auth/guest`: create a guest session (access token only).
pub async fn guest_session_handler(
    State(state): State<AppState>,
) -> AppResult<Json<GuestSessionResponse>> {
    let session = state.auth.guest_session().await?;
    Ok(Json(session.into()))
}
