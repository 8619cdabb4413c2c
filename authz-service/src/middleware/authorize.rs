use service_core::{
    axum::{
        extract::{Request, State},
        middleware::Next,
        response::Response,
    },
    error::AppError,
};

use crate::{services::decision::Decision, services::jwt::Credential, AppState};

/// Runs the decision engine for the authenticated caller before the handler.
/// Must be layered inside `auth_middleware`.
pub async fn authorize_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = req
        .extensions()
        .get::<Credential>()
        .map(|credential| credential.user_id)
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Credential missing from request extensions"
            ))
        })?;

    let decision = state
        .engine
        .decide(&user_id.to_string(), req.method().as_str(), req.uri().path())
        .await?;

    match decision {
        Decision::Allow => Ok(next.run(req).await),
        Decision::Deny { message } => {
            tracing::warn!(
                user_id = %user_id,
                method = %req.method(),
                path = %req.uri().path(),
                "Request denied"
            );
            Err(AppError::Forbidden(anyhow::anyhow!(message)))
        }
    }
}
