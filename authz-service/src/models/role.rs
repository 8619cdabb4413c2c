//! Role model - the fixed set of team roles and their endpoint grants.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Team role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    Owner,
    Admin,
    Member,
    Finance,
}

impl RoleName {
    pub const ALL: [RoleName; 4] = [
        RoleName::Owner,
        RoleName::Admin,
        RoleName::Member,
        RoleName::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Owner => "owner",
            RoleName::Admin => "admin",
            RoleName::Member => "member",
            RoleName::Finance => "finance",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(RoleName::Owner),
            "admin" => Ok(RoleName::Admin),
            "member" => Ok(RoleName::Member),
            "finance" => Ok(RoleName::Finance),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Role entity.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub role_name: String,
}

impl Role {
    pub fn new(name: RoleName) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            role_name: name.as_str().to_string(),
        }
    }

    /// Parsed role name; `None` for rows outside the known set.
    pub fn name(&self) -> Option<RoleName> {
        self.role_name.parse().ok()
    }

    pub fn is_owner(&self) -> bool {
        self.name() == Some(RoleName::Owner)
    }
}

/// Grant of one endpoint to one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow)]
pub struct Grant {
    pub role_id: Uuid,
    pub endpoint_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_names() {
        assert_eq!("owner".parse::<RoleName>(), Ok(RoleName::Owner));
        assert_eq!(" Finance ".parse::<RoleName>(), Ok(RoleName::Finance));
        assert!("superuser".parse::<RoleName>().is_err());
    }

    #[test]
    fn role_name_round_trips_through_str() {
        for name in RoleName::ALL {
            assert_eq!(name.as_str().parse::<RoleName>(), Ok(name));
        }
    }

    #[test]
    fn owner_detection() {
        assert!(Role::new(RoleName::Owner).is_owner());
        assert!(!Role::new(RoleName::Admin).is_owner());
    }
}
