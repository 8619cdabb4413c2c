use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::AccessRepository;

/// Answers whether a user's role in one team grants one endpoint.
#[derive(Clone)]
pub struct PermissionResolver {
    access: Arc<dyn AccessRepository>,
}

impl PermissionResolver {
    pub fn new(access: Arc<dyn AccessRepository>) -> Self {
        Self { access }
    }

    /// Endpoints without a team scope are open to any authenticated user.
    /// Otherwise only the role held in exactly `team_scope` counts; a role in
    /// any other team never grants access.
    #[tracing::instrument(skip(self))]
    pub async fn is_granted(
        &self,
        user_id: Uuid,
        team_scope: Option<Uuid>,
        endpoint_id: Uuid,
    ) -> Result<bool, AppError> {
        let Some(team_id) = team_scope else {
            return Ok(true);
        };

        match self
            .access
            .resolve_grant(team_id, user_id, endpoint_id)
            .await?
        {
            Some(resolution) => {
                tracing::debug!(role = %resolution.role_name, granted = resolution.granted, "Resolved team role");
                Ok(resolution.granted)
            }
            None => {
                tracing::debug!("No membership in team");
                Ok(false)
            }
        }
    }
}
