//! Command bus.
//!
//! `CommandBus::handle` routes each [`Command`] variant to its handler with a
//! single exhaustive `match`, so there is no such thing as an unroutable
//! command. Every handler opens one transaction, performs its checks and
//! writes through it, and commits as its last step. Returning early (or
//! being cancelled) drops the transaction and rolls it back.

mod invitation;
mod team;
mod user;

use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use crate::commands::{Command, CommandOutcome};
use crate::config::InvitationConfig;
use crate::models::User;
use crate::services::mailer::Mailer;
use crate::services::metrics::record_command;
use crate::store::{Transaction, UnitOfWork, UserRepository};

#[derive(Debug, Clone)]
pub struct InvitationSettings {
    /// Invitation links are `{link_base_url}/{invitation_id}`.
    pub link_base_url: String,
    pub expiry_days: i64,
}

impl From<&InvitationConfig> for InvitationSettings {
    fn from(config: &InvitationConfig) -> Self {
        Self {
            link_base_url: config.link_base_url.trim_end_matches('/').to_string(),
            expiry_days: config.expiry_days,
        }
    }
}

/// Shared handles passed to every handler.
struct HandlerContext<'a> {
    uow: &'a dyn UnitOfWork,
    mailer: &'a dyn Mailer,
    settings: &'a InvitationSettings,
}

#[derive(Clone)]
pub struct CommandBus {
    uow: Arc<dyn UnitOfWork>,
    mailer: Arc<dyn Mailer>,
    settings: InvitationSettings,
}

impl CommandBus {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        mailer: Arc<dyn Mailer>,
        settings: InvitationSettings,
    ) -> Self {
        Self {
            uow,
            mailer,
            settings,
        }
    }

    #[tracing::instrument(skip_all, fields(command = command.kind(), actor = %command.actor()))]
    pub async fn handle(&self, command: Command) -> Result<CommandOutcome, AppError> {
        let kind = command.kind();
        let result = self.dispatch(command).await;

        match &result {
            Ok(_) => {
                tracing::info!("Command handled");
                record_command(kind, "ok");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Command rejected");
                record_command(kind, result_label(e));
            }
        }

        result
    }

    async fn dispatch(&self, command: Command) -> Result<CommandOutcome, AppError> {
        let ctx = HandlerContext {
            uow: self.uow.as_ref(),
            mailer: self.mailer.as_ref(),
            settings: &self.settings,
        };

        match command {
            Command::CreateTeam {
                team_id,
                name,
                description,
                is_personal,
                actor,
            } => team::create_team(&ctx, team_id, name, description, is_personal, actor).await,
            Command::UpdateTeam {
                team_id,
                name,
                description,
                actor: _,
            } => team::update_team(&ctx, team_id, name, description).await,
            Command::UpdateLastActiveTeam { team_id, actor } => {
                team::update_last_active_team(&ctx, team_id, actor).await
            }
            Command::ChangeMemberRole {
                team_id,
                membership_id,
                role,
                actor,
            } => team::change_member_role(&ctx, team_id, membership_id, role, actor).await,
            Command::DeleteTeamMember {
                team_id,
                membership_id,
                actor,
            } => team::delete_team_member(&ctx, team_id, membership_id, actor).await,
            Command::UpdateTeamAvatar {
                team_id,
                avatar_url,
                actor: _,
            } => team::set_team_avatar(&ctx, team_id, Some(avatar_url)).await,
            Command::DeleteTeamAvatar { team_id, actor: _ } => {
                team::set_team_avatar(&ctx, team_id, None).await
            }
            Command::InviteMember {
                team_id,
                invitees,
                actor,
            } => invitation::invite_member(&ctx, team_id, invitees, actor).await,
            Command::ResendInvitation {
                team_id,
                invitation_id,
                actor,
            } => invitation::resend_invitation(&ctx, team_id, invitation_id, actor).await,
            Command::DeleteInvitation {
                team_id,
                invitation_id,
                actor: _,
            } => invitation::delete_invitation(&ctx, team_id, invitation_id).await,
            Command::UpdateInvitationStatus {
                invitation_id,
                status,
                actor,
            } => invitation::update_invitation_status(&ctx, invitation_id, status, actor).await,
            Command::UpdateUser {
                first_name,
                last_name,
                phone_number,
                actor,
            } => user::update_user(&ctx, actor, first_name, last_name, phone_number).await,
            Command::DeleteUser { actor } => user::delete_user(&ctx, actor).await,
            Command::UpdateUserAvatar { avatar_url, actor } => {
                user::set_user_avatar(&ctx, actor, Some(avatar_url)).await
            }
            Command::DeleteUserAvatar { actor } => user::set_user_avatar(&ctx, actor, None).await,
        }
    }
}

fn result_label(err: &AppError) -> &'static str {
    match err {
        AppError::BadRequest(_) | AppError::ValidationError(_) => "bad_request",
        AppError::NotFound(_) => "not_found",
        AppError::Unauthorized(_) => "unauthorized",
        AppError::Forbidden(_) => "forbidden",
        AppError::Conflict(_) => "conflict",
        _ => "error",
    }
}

async fn load_user(tx: &mut dyn Transaction, user_id: Uuid) -> Result<User, AppError> {
    tx.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("user {} not found", user_id)))
}

/// Keep only a non-blank replacement value.
fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
