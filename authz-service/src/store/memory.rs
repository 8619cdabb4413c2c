//! In-memory implementation of the store.
//!
//! Committed state lives behind a `tokio::sync::RwLock`. A transaction holds
//! an exclusive writer lock for its whole lifetime and works on a private
//! copy of the committed state; `commit` swaps the copy in. Dropping the
//! transaction releases the writer lock and discards the copy.
//!
//! Readers never wait on the writer lock, so authorization checks keep
//! running while a command is in flight. They see committed state only.
//!
//! Unique constraints mirror the Postgres schema and are checked when a row
//! is written. Foreign keys are not enforced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{
    AccessRepository, EndpointRepository, GrantResolution, InvitationRepository,
    MembershipRepository, RoleRepository, TeamRepository, Transaction, UnitOfWork,
    UserRepository,
};
use crate::models::{
    Endpoint, Grant, Invitation, Membership, MembershipWithRole, Role, RoleName, Team, User,
};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    teams: HashMap<Uuid, Team>,
    memberships: HashMap<Uuid, Membership>,
    invitations: HashMap<Uuid, Invitation>,
    roles: HashMap<Uuid, Role>,
    endpoints: HashMap<Uuid, Endpoint>,
    grants: HashSet<Grant>,
}

impl State {
    fn with_role(&self, membership: &Membership) -> Result<MembershipWithRole, AppError> {
        let role = self.roles.get(&membership.role_id).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "membership {} references unknown role {}",
                membership.membership_id,
                membership.role_id
            ))
        })?;

        Ok(MembershipWithRole {
            membership_id: membership.membership_id,
            team_id: membership.team_id,
            user_id: membership.user_id,
            role_id: membership.role_id,
            role_name: role.role_name.clone(),
        })
    }

    fn membership_of(&self, team_id: Uuid, user_id: Uuid) -> Option<&Membership> {
        self.memberships
            .values()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
    }
}

fn conflict(what: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!("{} already exists", what))
}

fn missing(what: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} not found", what, id))
}

/// Non-durable store for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    committed: Arc<RwLock<State>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn teams(&self) -> Vec<Team> {
        self.committed.read().await.teams.values().cloned().collect()
    }

    pub async fn memberships(&self) -> Vec<Membership> {
        self.committed
            .read()
            .await
            .memberships
            .values()
            .cloned()
            .collect()
    }

    pub async fn invitations(&self) -> Vec<Invitation> {
        self.committed
            .read()
            .await
            .invitations
            .values()
            .cloned()
            .collect()
    }

    pub async fn users(&self) -> Vec<User> {
        self.committed.read().await.users.values().cloned().collect()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, AppError> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.committed.read().await.clone();

        Ok(Box::new(InMemoryTransaction {
            committed: self.committed.clone(),
            working,
            _guard: guard,
        }))
    }
}

#[async_trait]
impl AccessRepository for InMemoryStore {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, AppError> {
        let state = self.committed.read().await;
        let mut endpoints: Vec<Endpoint> = state.endpoints.values().cloned().collect();
        endpoints.sort_by(|a, b| a.endpoint_name.cmp(&b.endpoint_name));
        Ok(endpoints)
    }

    async fn resolve_grant(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<Option<GrantResolution>, AppError> {
        let state = self.committed.read().await;
        let Some(membership) = state.membership_of(team_id, user_id) else {
            return Ok(None);
        };
        let with_role = state.with_role(membership)?;

        Ok(Some(GrantResolution {
            role_name: with_role.role_name,
            granted: state.grants.contains(&Grant {
                role_id: membership.role_id,
                endpoint_id,
            }),
        }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Open in-memory transaction. Holds the store's writer lock until dropped.
pub struct InMemoryTransaction {
    committed: Arc<RwLock<State>>,
    working: State,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let InMemoryTransaction {
            committed,
            working,
            _guard,
        } = *self;
        *committed.write().await = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for InMemoryTransaction {
    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>, AppError> {
        Ok(self.working.teams.get(&team_id).cloned())
    }

    async fn insert_team(&mut self, team: &Team) -> Result<(), AppError> {
        if self.working.teams.contains_key(&team.team_id) {
            return Err(conflict("team"));
        }
        self.working.teams.insert(team.team_id, team.clone());
        Ok(())
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), AppError> {
        match self.working.teams.get_mut(&team.team_id) {
            Some(existing) => {
                *existing = team.clone();
                Ok(())
            }
            None => Err(missing("team", team.team_id)),
        }
    }
}

#[async_trait]
impl MembershipRepository for InMemoryTransaction {
    async fn find_membership(
        &mut self,
        membership_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError> {
        self.working
            .memberships
            .get(&membership_id)
            .map(|m| self.working.with_role(m))
            .transpose()
    }

    async fn find_membership_by_user(
        &mut self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError> {
        self.working
            .membership_of(team_id, user_id)
            .map(|m| self.working.with_role(m))
            .transpose()
    }

    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError> {
        if self.working.memberships.contains_key(&membership.membership_id)
            || self
                .working
                .membership_of(membership.team_id, membership.user_id)
                .is_some()
        {
            return Err(conflict("membership"));
        }
        self.working
            .memberships
            .insert(membership.membership_id, membership.clone());
        Ok(())
    }

    async fn update_membership_role(
        &mut self,
        membership_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), AppError> {
        let membership = self
            .working
            .memberships
            .get_mut(&membership_id)
            .ok_or_else(|| missing("membership", membership_id))?;
        membership.role_id = role_id;
        Ok(())
    }

    async fn touch_membership(
        &mut self,
        membership_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let membership = self
            .working
            .memberships
            .get_mut(&membership_id)
            .ok_or_else(|| missing("membership", membership_id))?;
        membership.last_active_utc = Some(at);
        Ok(())
    }

    async fn delete_membership(&mut self, membership_id: Uuid) -> Result<(), AppError> {
        self.working
            .memberships
            .remove(&membership_id)
            .map(|_| ())
            .ok_or_else(|| missing("membership", membership_id))
    }

    async fn list_member_emails(&mut self, team_id: Uuid) -> Result<Vec<String>, AppError> {
        let state = &self.working;
        Ok(state
            .memberships
            .values()
            .filter(|m| m.team_id == team_id)
            .filter_map(|m| state.users.get(&m.user_id))
            .map(|u| u.email.to_lowercase())
            .collect())
    }
}

#[async_trait]
impl InvitationRepository for InMemoryTransaction {
    async fn find_invitation(
        &mut self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, AppError> {
        Ok(self.working.invitations.get(&invitation_id).cloned())
    }

    async fn find_outstanding_invitation(
        &mut self,
        team_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, AppError> {
        Ok(self
            .working
            .invitations
            .values()
            .find(|i| {
                i.team_id == team_id && i.email.eq_ignore_ascii_case(email) && i.is_outstanding()
            })
            .cloned())
    }

    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError> {
        if self
            .working
            .invitations
            .contains_key(&invitation.invitation_id)
        {
            return Err(conflict("invitation"));
        }
        self.working
            .invitations
            .insert(invitation.invitation_id, invitation.clone());
        Ok(())
    }

    async fn update_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError> {
        match self.working.invitations.get_mut(&invitation.invitation_id) {
            Some(existing) => {
                *existing = invitation.clone();
                Ok(())
            }
            None => Err(missing("invitation", invitation.invitation_id)),
        }
    }

    async fn delete_invitation(&mut self, invitation_id: Uuid) -> Result<(), AppError> {
        self.working
            .invitations
            .remove(&invitation_id)
            .map(|_| ())
            .ok_or_else(|| missing("invitation", invitation_id))
    }
}

#[async_trait]
impl UserRepository for InMemoryTransaction {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        let taken = self.working.users.contains_key(&user.user_id)
            || self
                .working
                .users
                .values()
                .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(conflict("user"));
        }
        self.working.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), AppError> {
        match self.working.users.get_mut(&user.user_id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(missing("user", user.user_id)),
        }
    }
}

#[async_trait]
impl RoleRepository for InMemoryTransaction {
    async fn find_role_by_name(&mut self, name: RoleName) -> Result<Option<Role>, AppError> {
        Ok(self
            .working
            .roles
            .values()
            .find(|r| r.role_name == name.as_str())
            .cloned())
    }
}

#[async_trait]
impl EndpointRepository for InMemoryTransaction {
    async fn upsert_role(&mut self, name: RoleName) -> Result<Role, AppError> {
        if let Some(role) = self
            .working
            .roles
            .values()
            .find(|r| r.role_name == name.as_str())
        {
            return Ok(role.clone());
        }
        let role = Role::new(name);
        self.working.roles.insert(role.role_id, role.clone());
        Ok(role)
    }

    async fn upsert_endpoint(&mut self, endpoint: &Endpoint) -> Result<Endpoint, AppError> {
        let clash = self.working.endpoints.values().any(|e| {
            e.endpoint_name != endpoint.endpoint_name
                && e.path_pattern == endpoint.path_pattern
                && e.http_method == endpoint.http_method
        });
        if clash {
            return Err(conflict("endpoint for this path and method"));
        }

        let existing = self
            .working
            .endpoints
            .values_mut()
            .find(|e| e.endpoint_name == endpoint.endpoint_name);

        match existing {
            Some(stored) => {
                stored.path_pattern = endpoint.path_pattern.clone();
                stored.http_method = endpoint.http_method.clone();
                Ok(stored.clone())
            }
            None => {
                self.working
                    .endpoints
                    .insert(endpoint.endpoint_id, endpoint.clone());
                Ok(endpoint.clone())
            }
        }
    }

    async fn grant(&mut self, role_id: Uuid, endpoint_id: Uuid) -> Result<(), AppError> {
        if !self.working.roles.contains_key(&role_id) {
            return Err(missing("role", role_id));
        }
        if !self.working.endpoints.contains_key(&endpoint_id) {
            return Err(missing("endpoint", endpoint_id));
        }
        self.working.grants.insert(Grant {
            role_id,
            endpoint_id,
        });
        Ok(())
    }
}
