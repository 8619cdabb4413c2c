//! Persistence boundary.
//!
//! Mutations go through a [`UnitOfWork`], which hands out a [`Transaction`].
//! The transaction is the only way to reach the repositories, so every
//! repository call is explicitly bound to the transaction it runs in.
//! Dropping a transaction without calling [`Transaction::commit`] discards
//! its writes. That covers early returns, `?`, panics and a cancelled caller.
//!
//! Request-time authorization reads go through [`AccessRepository`], which
//! needs no transaction.
//!
//! Two backends implement these traits: [`postgres::PgStore`] and
//! [`memory::InMemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    Endpoint, Invitation, Membership, MembershipWithRole, Role, RoleName, Team, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Role held by a user in one team, and whether it grants one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantResolution {
    pub role_name: String,
    pub granted: bool,
}

/// Read-only access data used on every authorization check.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, AppError>;

    /// `None` when the user holds no membership in `team_id`.
    async fn resolve_grant(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<Option<GrantResolution>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait TeamRepository: Send {
    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>, AppError>;
    async fn insert_team(&mut self, team: &Team) -> Result<(), AppError>;
    async fn update_team(&mut self, team: &Team) -> Result<(), AppError>;
}

#[async_trait]
pub trait MembershipRepository: Send {
    async fn find_membership(
        &mut self,
        membership_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError>;

    async fn find_membership_by_user(
        &mut self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError>;

    /// Fails with `Conflict` when the user already belongs to the team.
    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError>;

    async fn update_membership_role(
        &mut self,
        membership_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), AppError>;

    async fn touch_membership(
        &mut self,
        membership_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn delete_membership(&mut self, membership_id: Uuid) -> Result<(), AppError>;

    /// Lowercased email addresses of every member of the team.
    async fn list_member_emails(&mut self, team_id: Uuid) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait InvitationRepository: Send {
    async fn find_invitation(&mut self, invitation_id: Uuid)
        -> Result<Option<Invitation>, AppError>;

    /// An active pending or sent invitation for `email` to `team_id`.
    async fn find_outstanding_invitation(
        &mut self,
        team_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, AppError>;

    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError>;
    async fn update_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError>;
    async fn delete_invitation(&mut self, invitation_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait UserRepository: Send {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError>;
    async fn update_user(&mut self, user: &User) -> Result<(), AppError>;
}

#[async_trait]
pub trait RoleRepository: Send {
    async fn find_role_by_name(&mut self, name: RoleName) -> Result<Option<Role>, AppError>;
}

/// Writes used when seeding the endpoint registry and role grants.
#[async_trait]
pub trait EndpointRepository: Send {
    /// Returns the stored role, creating it if absent.
    async fn upsert_role(&mut self, name: RoleName) -> Result<Role, AppError>;

    /// Returns the stored endpoint for the same name, creating or updating it.
    async fn upsert_endpoint(&mut self, endpoint: &Endpoint) -> Result<Endpoint, AppError>;

    /// Idempotent.
    async fn grant(&mut self, role_id: Uuid, endpoint_id: Uuid) -> Result<(), AppError>;
}

/// One open transaction against the store.
#[async_trait]
pub trait Transaction:
    TeamRepository
    + MembershipRepository
    + InvitationRepository
    + UserRepository
    + RoleRepository
    + EndpointRepository
    + Send
{
    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    /// Explicit rollback. Dropping the transaction has the same effect.
    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, AppError>;
}
