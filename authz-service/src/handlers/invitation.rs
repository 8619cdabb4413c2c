//! Invitation endpoints.
//!
//! Team admins invite, resend and withdraw under `/teams/:team_id`; the
//! invitee answers through `/invitations/:invitation_id`.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::commands::{Command, Invitee};
use crate::middleware::AuthUser;
use crate::models::InvitationStatus;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct InviteMembersRequest {
    #[validate(length(min = 1, message = "At least one invitee is required"), nested)]
    pub invitees: Vec<Invitee>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerInvitationRequest {
    pub status: InvitationStatus,
}

/// POST /api/v1/teams/:team_id/invitations
pub async fn invite_members(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(req): Json<InviteMembersRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let outcome = state
        .bus
        .handle(Command::InviteMember {
            team_id,
            invitees: req.invitees,
            actor: credential.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/teams/:team_id/invitations/:invitation_id/resend
pub async fn resend_invitation(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .bus
        .handle(Command::ResendInvitation {
            team_id,
            invitation_id,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}

/// DELETE /api/v1/teams/:team_id/invitations/:invitation_id
pub async fn delete_invitation(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .bus
        .handle(Command::DeleteInvitation {
            team_id,
            invitation_id,
            actor: credential.user_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/invitations/:invitation_id
pub async fn answer_invitation(
    State(state): State<AppState>,
    AuthUser(credential): AuthUser,
    Path(invitation_id): Path<Uuid>,
    Json(req): Json<AnswerInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .bus
        .handle(Command::UpdateInvitationStatus {
            invitation_id,
            status: req.status,
            actor: credential.user_id,
        })
        .await?;

    Ok(Json(outcome))
}
