use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use super::{load_user, non_empty, HandlerContext};
use crate::commands::CommandOutcome;
use crate::store::UserRepository;

pub(super) async fn update_user(
    ctx: &HandlerContext<'_>,
    actor: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;
    let mut user = load_user(tx.as_mut(), actor).await?;

    if let Some(first_name) = non_empty(first_name) {
        user.first_name = first_name;
    }
    if let Some(last_name) = non_empty(last_name) {
        user.last_name = last_name;
    }
    if let Some(phone_number) = non_empty(phone_number) {
        user.phone_number = Some(phone_number);
    }
    user.updated_utc = Utc::now();

    tx.update_user(&user).await?;
    tx.commit().await?;

    Ok(CommandOutcome::User(user))
}

/// Soft delete: the account is deactivated, not removed.
pub(super) async fn delete_user(
    ctx: &HandlerContext<'_>,
    actor: Uuid,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;
    let mut user = load_user(tx.as_mut(), actor).await?;

    user.is_active = false;
    user.updated_utc = Utc::now();

    tx.update_user(&user).await?;
    tx.commit().await?;

    tracing::info!(user_id = %actor, "User deactivated");
    Ok(CommandOutcome::Done)
}

pub(super) async fn set_user_avatar(
    ctx: &HandlerContext<'_>,
    actor: Uuid,
    avatar_url: Option<String>,
) -> Result<CommandOutcome, AppError> {
    let mut tx = ctx.uow.begin().await?;
    let mut user = load_user(tx.as_mut(), actor).await?;

    let previous = std::mem::replace(&mut user.avatar_url, avatar_url);
    user.updated_utc = Utc::now();

    tx.update_user(&user).await?;
    tx.commit().await?;

    Ok(CommandOutcome::AvatarReplaced { previous })
}
