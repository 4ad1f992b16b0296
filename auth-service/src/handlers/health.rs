use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::AppState;

/// GET /health — process liveness.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    }))
}

/// GET /ready — readiness including store pings.
pub async fn ready(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store readiness check failed");
        AppError::ServiceUnavailable
    })?;

    state.cache.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Session store readiness check failed");
        AppError::ServiceUnavailable
    })?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ready",
            "checks": {
                "credential_store": "up",
                "session_store": "up",
            }
        })),
    ))
}
