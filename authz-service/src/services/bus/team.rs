use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use super::{non_empty, HandlerContext};
use crate::commands::CommandOutcome;
use crate::models::{Membership, MembershipWithRole, RoleName, Team};
use crate::store::{MembershipRepository, RoleRepository, TeamRepository, Transaction};

pub(super) async fn create_team(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    name: String,
    description: String,
    is_personal: bool,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let name = non_empty(Some(name))
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("team name is required")))?;

    let mut tx = ctx.uow.begin().await?;

    if tx.find_team(team_id).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Team already exists")));
    }

    let owner = tx
        .find_role_by_name(RoleName::Owner)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("role owner not found")))?;

    let team = Team::new(team_id, name, description, is_personal, actor);
    tx.insert_team(&team).await?;
    tx.insert_membership(&Membership::new(team_id, actor, owner.role_id))
        .await?;

    tx.commit().await?;

    tracing::info!(team_id = %team_id, is_personal, "Team created");
    Ok(CommandOutcome::Team(team))
}

pub(super) async fn update_team(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    name: Option<String>,
    description: Option<String>,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let mut team = tx
        .find_team(team_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("team {} not found", team_id)))?;

    if let Some(name) = non_empty(name) {
        team.team_name = name;
    }
    if let Some(description) = non_empty(description) {
        team.description = description;
    }
    team.updated_utc = Utc::now();

    tx.update_team(&team).await?;
    tx.commit().await?;

    Ok(CommandOutcome::Team(team))
}

pub(super) async fn update_last_active_team(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let membership = tx
        .find_membership_by_user(team_id, actor)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Team is not found")))?;

    tx.touch_membership(membership.membership_id, Utc::now())
        .await?;
    tx.commit().await?;

    Ok(CommandOutcome::Done)
}

/// Guards shared by role changes and removals, checked in this order.
async fn load_managed_membership(
    tx: &mut dyn Transaction,
    team_id: Uuid,
    membership_id: Uuid,
    actor: Uuid,
    self_message: &str,
    owner_message: &str,
) -> Result<MembershipWithRole, AppError> {
    let membership = tx.find_membership(membership_id).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("membership {} not found", membership_id))
    })?;

    if membership.user_id == actor {
        return Err(AppError::Forbidden(anyhow::anyhow!("{}", self_message)));
    }

    if membership.team_id != team_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Team with ID {} is not match with membership-team ID",
            team_id
        )));
    }

    if membership.is_owner() {
        return Err(AppError::Forbidden(anyhow::anyhow!("{}", owner_message)));
    }

    Ok(membership)
}

pub(super) async fn change_member_role(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    membership_id: Uuid,
    role: RoleName,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let membership = load_managed_membership(
        tx.as_mut(),
        team_id,
        membership_id,
        actor,
        "You cannot change your own role",
        "You cannot change the role of the team owner",
    )
    .await?;

    if role == RoleName::Owner {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "You cannot change role to owner"
        )));
    }

    let role = tx
        .find_role_by_name(role)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("role {} not found", role)))?;

    tx.update_membership_role(membership.membership_id, role.role_id)
        .await?;
    tx.commit().await?;

    tracing::info!(
        team_id = %team_id,
        membership_id = %membership_id,
        role = %role.role_name,
        "Member role changed"
    );
    Ok(CommandOutcome::Done)
}

pub(super) async fn delete_team_member(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    membership_id: Uuid,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let membership = load_managed_membership(
        tx.as_mut(),
        team_id,
        membership_id,
        actor,
        "You cannot delete yourself",
        "You cannot delete owner of the team",
    )
    .await?;

    tx.delete_membership(membership.membership_id).await?;
    tx.commit().await?;

    tracing::info!(team_id = %team_id, membership_id = %membership_id, "Member removed");
    Ok(CommandOutcome::Done)
}

pub(super) async fn set_team_avatar(
    ctx: &HandlerContext<'_>,
    team_id: Uuid,
    avatar_url: Option<String>,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;

    let mut team = tx
        .find_team(team_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("team {} not found", team_id)))?;

    let previous = std::mem::replace(&mut team.avatar_url, avatar_url);
    team.updated_utc = Utc::now();

    tx.update_team(&team).await?;
    tx.commit().await?;

    Ok(CommandOutcome::AvatarReplaced { previous })
}
