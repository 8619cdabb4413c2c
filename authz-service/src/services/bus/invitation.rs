use chrono::Utc;
use serde_json::json;
use service_core::error::AppError;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use super::{load_user, HandlerContext, InvitationSettings};
use crate::commands::{CommandOutcome, Invitee};
use crate::models::{Invitation, InvitationStatus, Membership, RoleName, Team, User};
use crate::services::mailer::{EmailTemplate, Mailer};
use crate::store::{
    InvitationRepository, MembershipRepository, RoleRepository, TeamRepository, Transaction,
};

pub(super) async fn invite_member(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    invitees: Vec<Invitee>,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    for invitee in &invitees {
        invitee.validate()?;
    }
    if invitees.iter().any(|i| i.role == RoleName::Owner) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "you can't invite a member as owner of the team"
        )));
    }

    let mut tx = ctx.uow.begin().await?;

    let team = load_shared_team(tx.as_mut(), team_id).await?;
    let sender = load_user(tx.as_mut(), actor).await?;
    let members: HashSet<String> = tx.list_member_emails(team_id).await?.into_iter().collect();

    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut created = Vec::new();

    for invitee in invitees {
        let email = invitee.email.trim().to_lowercase();
        if members.contains(&email) || !seen.insert(email.clone()) {
            tracing::debug!(email = %email, "Skipping invitee");
            continue;
        }

        let role = tx
            .find_role_by_name(invitee.role)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("role {} not found", invitee.role)))?;

        if tx
            .find_outstanding_invitation(team_id, &email)
            .await?
            .is_some()
        {
            tracing::debug!(email = %email, "Invitation already outstanding");
            continue;
        }

        let invitation = Invitation::new(
            email,
            team_id,
            role.role_id,
            actor,
            now,
            ctx.settings.expiry_days,
        );
        tx.insert_invitation(&invitation).await?;

        send_invitation_mail(ctx.mailer, ctx.settings, &sender, &team, &invitation).await?;
        created.push(invitation);
    }

    tx.commit().await?;

    tracing::info!(team_id = %team_id, invited = created.len(), "Invitations sent");
    Ok(CommandOutcome::Invitations(created))
}

pub(super) async fn resend_invitation(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    invitation_id: Uuid,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let team = load_shared_team(tx.as_mut(), team_id).await?;
    let mut invitation = load_team_invitation(tx.as_mut(), team_id, invitation_id).await?;

    invitation.resend(Utc::now(), ctx.settings.expiry_days)?;

    let sender = load_user(tx.as_mut(), actor).await?;
    send_invitation_mail(ctx.mailer, ctx.settings, &sender, &team, &invitation).await?;

    tx.update_invitation(&invitation).await?;
    tx.commit().await?;

    Ok(CommandOutcome::Invitation(invitation))
}

pub(super) async fn delete_invitation(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    invitation_id: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let invitation = load_team_invitation(tx.as_mut(), team_id, invitation_id).await?;

    match invitation.status() {
        Some(InvitationStatus::Accepted) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "invitation already accepted"
            )));
        }
        Some(InvitationStatus::Declined) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "invitation already declined"
            )));
        }
        _ => {}
    }

    tx.delete_invitation(invitation_id).await?;
    tx.commit().await?;

    Ok(CommandOutcome::Done)
}

pub(super) async fn update_invitation_status(
    ctx: &HandlerContext<'_>,
    invitation_id: Uuid,
    status: InvitationStatus,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    if !status.is_terminal() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "invitation status must be accepted or declined"
        )));
    }

    let mut tx = ctx.uow.begin().await?;

    let mut invitation = tx.find_invitation(invitation_id).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("invitation {} not found", invitation_id))
    })?;
    let user = load_user(tx.as_mut(), actor).await?;

    if !invitation.email.eq_ignore_ascii_case(user.email.trim()) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "you are not invited to join this team with ID {}",
            invitation.team_id
        )));
    }

    if !invitation.is_active {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "invitation with ID {} is not active anymore",
            invitation_id
        )));
    }

    let now = Utc::now();
    if status == InvitationStatus::Accepted && invitation.is_past_expiry(now) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "invitation with ID {} has expired",
            invitation_id
        )));
    }

    invitation.respond(status, now)?;
    tx.update_invitation(&invitation).await?;

    if status == InvitationStatus::Accepted {
        tx.insert_membership(&Membership::new(
            invitation.team_id,
            actor,
            invitation.role_id,
        ))
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        invitation_id = %invitation_id,
        team_id = %invitation.team_id,
        status = status.as_str(),
        "Invitation answered"
    );
    Ok(CommandOutcome::Invitation(invitation))
}

/// The team, provided members can be invited to it.
async fn load_shared_team(tx: &mut dyn Transaction, team_id: Uuid) -> Result<Team, AppError> {
    let team = tx
        .find_team(team_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("team {} not found", team_id)))?;

    if team.is_personal {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "you can't invite a member to personal team with ID {}",
            team_id
        )));
    }

    Ok(team)
}

async fn load_team_invitation(
    tx: &mut dyn Transaction,
    team_id: Uuid,
    invitation_id: Uuid,
) -> Result<Invitation, AppError> {
    let invitation = tx.find_invitation(invitation_id).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("invitation {} not found", invitation_id))
    })?;

    if invitation.team_id != team_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "invitation with ID {} does not belong to team with ID {}",
            invitation_id,
            team_id
        )));
    }

    Ok(invitation)
}

async fn send_invitation_mail(
    mailer: &dyn Mailer,
    settings: &InvitationSettings,
    sender: &User,
    team: &Team,
    invitation: &Invitation,
) -> Result<(), AppError> {
    let data = json!({
        "SenderName": sender.full_name(),
        "TeamName": team.team_name,
        "EmailTo": invitation.email,
        "InvitationLink": format!("{}/{}", settings.link_base_url, invitation.invitation_id),
        "InvitationID": invitation.invitation_id,
    });

    let payload = mailer.create_payload(
        EmailTemplate::Invitation,
        &invitation.email,
        &format!("Invitation to join {} team", team.team_name),
        data,
    );

    mailer.send(&payload).await
}
