//! Endpoint model - a protected (path pattern, method) pair.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Endpoint entity. `path_pattern` uses `:id` for identifier segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Endpoint {
    pub endpoint_id: Uuid,
    pub endpoint_name: String,
    pub path_pattern: String,
    pub http_method: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, path_pattern: impl Into<String>, method: &str) -> Self {
        Self {
            endpoint_id: Uuid::new_v4(),
            endpoint_name: name.into(),
            path_pattern: path_pattern.into(),
            http_method: method.to_uppercase(),
        }
    }
}
