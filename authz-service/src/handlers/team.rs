use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{commands::Command, middleware::AuthUser, models::RoleName, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Team name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
    #[serde(default)]
    pub is_personal: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: RoleName,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AvatarRequest {
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: String,
}

pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::CreateTeam {
            team_id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            is_personal: req.is_personal,
            actor: credential.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn update_team(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::UpdateTeam {
            team_id,
            name: req.name,
            description: req.description,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}

pub async fn update_last_active_team(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .bus
        .handle(Command::UpdateLastActiveTeam {
            team_id,
            actor: credential.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path((team_id, membership_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<StatusCode, AppError> {
    state
        .bus
        .handle(Command::ChangeMemberRole {
            team_id,
            membership_id,
            role: req.role,
            actor: credential.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_team_member(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path((team_id, membership_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .bus
        .handle(Command::DeleteTeamMember {
            team_id,
            membership_id,
            actor: credential.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_team_avatar(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(req): Json<AvatarRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::UpdateTeamAvatar {
            team_id,
            avatar_url: req.avatar_url,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}

pub async fn delete_team_avatar(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .bus
        .handle(Command::DeleteTeamAvatar {
            team_id,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}
