use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::{commands::Command, middleware::AuthUser, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 32, message = "Phone number is too long"))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserAvatarRequest {
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: String,
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::UpdateUser {
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}

pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
) -> Result<StatusCode, AppError> {
    state
        .bus
        .handle(Command::DeleteUser {
            actor: credential.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_my_avatar(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Json(req): Json<UserAvatarRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::UpdateUserAvatar {
            avatar_url: req.avatar_url,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}

pub async fn delete_my_avatar(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .bus
        .handle(Command::DeleteUserAvatar {
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}
