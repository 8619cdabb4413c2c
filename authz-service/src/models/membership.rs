//! Membership model - a user's role within one team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Membership entity. At most one per (team_id, user_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub membership_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub last_active_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    pub fn new(team_id: Uuid, user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            team_id,
            user_id,
            role_id,
            last_active_utc: None,
            created_utc: Utc::now(),
        }
    }
}

/// Membership joined with its role name, as read by the mutation handlers.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MembershipWithRole {
    pub membership_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
}

impl MembershipWithRole {
    pub fn is_owner(&self) -> bool {
        self.role_name == crate::models::RoleName::Owner.as_str()
    }
}
