//! Declarative endpoint and grant seed.
//!
//! The seed file lists protected endpoints by name and, per role, the
//! endpoint names that role may call. Applying it is idempotent: roles and
//! endpoints are upserted by name and existing grants are left in place.

use serde::Deserialize;
use service_core::config::{load_yaml_file, parse_yaml_str};
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};

use crate::models::{Endpoint, RoleName};
use crate::store::{EndpointRepository, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct AccessSeed {
    pub endpoints: Vec<EndpointSeed>,
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSeed {
    pub name: String,
    pub path: String,
    pub method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleSeed {
    pub name: RoleName,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub roles: usize,
    pub endpoints: usize,
    pub grants: usize,
}

impl AccessSeed {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let seed: Self = load_yaml_file(path)?;
        seed.check()?;
        Ok(seed)
    }

    pub fn parse(contents: &str) -> Result<Self, AppError> {
        let seed: Self = parse_yaml_str(contents)?;
        seed.check()?;
        Ok(seed)
    }

    fn check(&self) -> Result<(), AppError> {
        let mut names = HashSet::new();
        let mut routes = HashSet::new();
        for endpoint in &self.endpoints {
            if !names.insert(endpoint.name.as_str()) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "endpoint {} is declared twice",
                    endpoint.name
                )));
            }
            if !routes.insert((endpoint.path.as_str(), endpoint.method.to_uppercase())) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} {} is declared twice",
                    endpoint.method,
                    endpoint.path
                )));
            }
        }

        for role in &self.roles {
            if let Some(unknown) = role.endpoints.iter().find(|e| !names.contains(e.as_str())) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "role {} is granted unknown endpoint {}",
                    role.name,
                    unknown
                )));
            }
        }

        Ok(())
    }

    /// Write every role, endpoint and grant in one transaction.
    #[tracing::instrument(skip_all)]
    pub async fn apply(&self, uow: &dyn UnitOfWork) -> Result<SeedSummary, AppError> {
        let mut tx = uow.begin().await?;
        let mut summary = SeedSummary::default();

        let mut role_ids = HashMap::new();
        for name in RoleName::ALL {
            let role = tx.upsert_role(name).await?;
            role_ids.insert(name, role.role_id);
            summary.roles += 1;
        }

        let mut endpoint_ids = HashMap::new();
        for seed in &self.endpoints {
            let stored = tx
                .upsert_endpoint(&Endpoint::new(&seed.name, &seed.path, &seed.method))
                .await?;
            endpoint_ids.insert(seed.name.as_str(), stored.endpoint_id);
            summary.endpoints += 1;
        }

        for role in &self.roles {
            let Some(role_id) = role_ids.get(&role.name).copied() else {
                continue;
            };
            for endpoint in &role.endpoints {
                if let Some(endpoint_id) = endpoint_ids.get(endpoint.as_str()).copied() {
                    tx.grant(role_id, endpoint_id).await?;
                    summary.grants += 1;
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            roles = summary.roles,
            endpoints = summary.endpoints,
            grants = summary.grants,
            "Access seed applied"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccessRepository, InMemoryStore};

    const SEED: &str = r#"
endpoints:
  - name: update_team
    path: /api/v1/teams/:id
    method: patch
  - name: create_team
    path: /api/v1/teams
    method: POST
roles:
  - name: owner
    endpoints: [update_team, create_team]
  - name: member
    endpoints: [create_team]
"#;

    #[test]
    fn parses_and_checks_references() {
        let seed = AccessSeed::parse(SEED).unwrap();
        assert_eq!(seed.endpoints.len(), 2);
        assert_eq!(seed.roles[0].name, RoleName::Owner);
    }

    #[test]
    fn rejects_unknown_endpoint_in_grant() {
        let seed = r#"
endpoints:
  - { name: a, path: /a, method: GET }
roles:
  - { name: admin, endpoints: [b] }
"#;
        assert!(matches!(
            AccessSeed::parse(seed),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn rejects_duplicate_route() {
        let seed = r#"
endpoints:
  - { name: a, path: /a, method: GET }
  - { name: b, path: /a, method: get }
"#;
        assert!(AccessSeed::parse(seed).is_err());
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let store = InMemoryStore::new();
        let seed = AccessSeed::parse(SEED).unwrap();

        let first = seed.apply(&store).await.unwrap();
        let second = seed.apply(&store).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.grants, 3);

        let endpoints = store.list_endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints
            .iter()
            .any(|e| e.endpoint_name == "update_team" && e.http_method == "PATCH"));
    }
}
