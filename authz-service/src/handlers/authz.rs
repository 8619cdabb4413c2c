//! Authorization check consumed by the gateway.
//!
//! The caller forwards the method and path of the request it wants to
//! admit. The identity is never read from the body: it is the subject of a
//! verified credential on the check request, or else the `user-id` header
//! the gateway sets after authenticating the caller. The header is trusted
//! as is, so this route must only be reachable from the gateway; it is not
//! behind the `/api/v1` auth layer.
//!
//! The answer is 200 with `{"allowed": true}` or 403 with the standard
//! forbidden message. Store failures surface as 500 and are never reported
//! as a deny.

use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::middleware::extract_token;
use crate::services::decision::Decision;
use crate::AppState;

/// Header the gateway sets to the identity it authenticated.
pub const USER_ID_HEADER: &str = "user-id";

/// Unknown fields, such as a body `user_id`, are rejected.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckRequest {
    #[validate(length(min = 1, message = "method is required"))]
    pub method: String,
    #[validate(length(min = 1, message = "path is required"))]
    pub path: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// POST /authz/check
pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    req.validate()?;

    let identity = resolve_identity(&state, &headers)?;

    match state.engine.decide(&identity, &req.method, &req.path).await? {
        Decision::Allow => Ok(Json(CheckResponse { allowed: true })),
        Decision::Deny { message } => Err(AppError::Forbidden(anyhow::anyhow!(message))),
    }
}

/// A bearer token or `access_token` cookie wins and must verify; otherwise
/// the gateway's `user-id` header. No identity at all reaches the engine as
/// an empty string, which holds no memberships.
fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(token) = extract_token(headers) {
        return Ok(state.jwt.validate(&token)?.user_id.to_string());
    }

    Ok(headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string())
}
