//! Request-time authorization.
//!
//! `decide` normalizes the request path, looks the endpoint up in the
//! registry, and for team-scoped endpoints asks the permission resolver
//! about the caller's role in the team named by the path.
//!
//! Endpoints that are not registered are allowed. Store failures are
//! returned as errors and never turned into a deny.

use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use super::endpoint_registry::EndpointRegistry;
use super::metrics::record_decision;
use super::permission::PermissionResolver;

pub const FORBIDDEN_MESSAGE: &str = "You are not authorized to access this resource";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny { message: String },
}

impl Decision {
    pub fn deny() -> Self {
        Decision::Deny {
            message: FORBIDDEN_MESSAGE.to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Clone)]
pub struct DecisionEngine {
    registry: Arc<EndpointRegistry>,
    resolver: PermissionResolver,
}

impl DecisionEngine {
    pub fn new(registry: Arc<EndpointRegistry>, resolver: PermissionResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    #[tracing::instrument(skip(self), fields(endpoint = tracing::field::Empty))]
    pub async fn decide(
        &self,
        identity: &str,
        method: &str,
        raw_path: &str,
    ) -> Result<Decision, AppError> {
        let result = self.evaluate(identity, method, raw_path).await;
        match &result {
            Ok(Decision::Allow) => record_decision("allow"),
            Ok(Decision::Deny { .. }) => record_decision("deny"),
            Err(_) => record_decision("error"),
        }
        result
    }

    async fn evaluate(
        &self,
        identity: &str,
        method: &str,
        raw_path: &str,
    ) -> Result<Decision, AppError> {
        let Some(endpoint) = self.registry.lookup(raw_path, method) else {
            tracing::debug!("No endpoint registered, allowing");
            return Ok(Decision::Allow);
        };
        tracing::Span::current().record("endpoint", endpoint.endpoint_name.as_str());

        if !endpoint.is_team_scoped() {
            return Ok(Decision::Allow);
        }

        // The lookup matched on `:id`, so the segment always parses.
        let team_id = endpoint.team_id(raw_path).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "team id segment of {} did not parse",
                raw_path
            ))
        })?;

        // Non-uuid identities cannot hold memberships.
        let user_id = Uuid::parse_str(identity).unwrap_or_else(|_| Uuid::nil());

        let granted = self
            .resolver
            .is_granted(user_id, Some(team_id), endpoint.endpoint_id)
            .await?;

        if granted {
            Ok(Decision::Allow)
        } else {
            tracing::info!(user_id = %user_id, team_id = %team_id, "Denied team-scoped request");
            Ok(Decision::deny())
        }
    }
}
