use axum::{extract::State, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::services::Mailer;
use crate::store::AccessRepository;
use crate::AppState;

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.access.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        e
    })?;

    state.mailer.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Mail queue health check failed");
        e
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up",
            "mail_queue": "up"
        },
        "endpoints": state.engine.registry().len()
    })))
}
