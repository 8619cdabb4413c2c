use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Team entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub team_id: Uuid,
    pub team_name: String,
    pub description: String,
    pub is_personal: bool,
    pub avatar_url: Option<String>,
    pub creator_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Team {
    pub fn new(
        team_id: Uuid,
        team_name: String,
        description: String,
        is_personal: bool,
        creator_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            team_id,
            team_name,
            description,
            is_personal,
            avatar_url: None,
            creator_id,
            created_utc: now,
            updated_utc: now,
        }
    }
}
