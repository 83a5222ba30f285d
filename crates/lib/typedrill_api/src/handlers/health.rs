//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /api/health`: verifies the store connection.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_connected = state.auth.store_healthy().await;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        db_connected,
        version: typedrill_core::version().to_string(),
    }))
}
