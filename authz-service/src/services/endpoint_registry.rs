//! Precomputed map from (normalized path, method) to a protected endpoint.
//!
//! Built once at startup from the stored endpoint set and shared read-only
//! behind an `Arc`; lookups take no locks.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Endpoint;

/// Placeholder that replaces identifier segments in a normalized path.
pub const ID_PLACEHOLDER: &str = ":id";

/// Registered endpoint as seen by the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEndpoint {
    pub endpoint_id: Uuid,
    pub endpoint_name: String,
    /// Index of the team id segment (split on `/`), for team-scoped endpoints.
    pub team_segment_index: Option<usize>,
}

impl RegisteredEndpoint {
    pub fn is_team_scoped(&self) -> bool {
        self.team_segment_index.is_some()
    }

    /// Team id named by a concrete request path matching this endpoint.
    pub fn team_id(&self, raw_path: &str) -> Option<Uuid> {
        let index = self.team_segment_index?;
        strip_query(raw_path)
            .split('/')
            .nth(index)
            .and_then(parse_id_segment)
    }
}

#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<(String, String), RegisteredEndpoint>,
}

impl EndpointRegistry {
    /// `team_segment` names the path segment that precedes a team id,
    /// e.g. `teams` for `/api/v1/teams/:id/members`.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>, team_segment: &str) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|endpoint| {
                let pattern = normalize_path(&endpoint.path_pattern);
                let team_segment_index = team_segment_index(&pattern, team_segment);
                let key = (pattern, endpoint.http_method.to_uppercase());
                let registered = RegisteredEndpoint {
                    endpoint_id: endpoint.endpoint_id,
                    endpoint_name: endpoint.endpoint_name,
                    team_segment_index,
                };
                (key, registered)
            })
            .collect();

        Self { endpoints }
    }

    pub fn lookup(&self, raw_path: &str, method: &str) -> Option<&RegisteredEndpoint> {
        let key = (normalize_path(raw_path), method.to_uppercase());
        self.endpoints.get(&key)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn strip_query(raw_path: &str) -> &str {
    raw_path.split('?').next().unwrap_or(raw_path)
}

/// Drop the query string and replace every id segment with `:id`.
pub fn normalize_path(raw_path: &str) -> String {
    strip_query(raw_path)
        .split('/')
        .map(|segment| {
            if parse_id_segment(segment).is_some() {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parses a path segment the way the `Path<Uuid>` extractor does:
/// percent-decoded, then any textual uuid form (hyphenated, simple, braced
/// or urn, either case).
pub fn parse_id_segment(segment: &str) -> Option<Uuid> {
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    Uuid::try_parse(&decoded).ok()
}

fn team_segment_index(pattern: &str, team_segment: &str) -> Option<usize> {
    let segments: Vec<&str> = pattern.split('/').collect();
    segments
        .windows(2)
        .position(|pair| pair[0] == team_segment && pair[1] == ID_PLACEHOLDER)
        .map(|position| position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEAM: &str = "3f2b9c1e-8d4a-4b6f-9e21-7a5c0d3e1b42";
    const OTHER_TEAM: &str = "a0b1c2d3-e4f5-4a6b-8c7d-9e0f1a2b3c4d";
    const MEMBER: &str = "11111111-2222-4333-8444-555555555555";

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(
            vec![
                Endpoint::new("GetTeam", "/api/v1/teams/:id", "GET"),
                Endpoint::new(
                    "ChangeMemberRole",
                    "/api/v1/teams/:id/members/:id",
                    "PATCH",
                ),
                Endpoint::new("GetMe", "/api/v1/users/me", "GET"),
            ],
            "teams",
        )
    }

    #[test]
    fn normalizes_uuid_segments_and_query() {
        assert_eq!(
            normalize_path(&format!("/api/v1/teams/{}/members/{}?page=2", TEAM, MEMBER)),
            "/api/v1/teams/:id/members/:id"
        );
        assert_eq!(normalize_path("/api/v1/users/me"), "/api/v1/users/me");
    }

    #[test]
    fn every_uuid_spelling_is_an_id_segment() {
        let expected = "/api/v1/teams/:id/members/:id";
        for team in [
            TEAM.to_uppercase(),
            TEAM.replace('-', ""),
            format!("{{{}}}", TEAM),
            format!("urn:uuid:{}", TEAM),
            format!("%7B{}%7D", TEAM),
            TEAM.replacen('3', "%33", 1),
        ] {
            assert_eq!(
                normalize_path(&format!("/api/v1/teams/{}/members/{}", team, MEMBER)),
                expected,
                "{}",
                team
            );
        }
    }

    #[test]
    fn malformed_ids_are_left_alone() {
        assert_eq!(normalize_path("/teams/3f2b9c1e-8d4a"), "/teams/3f2b9c1e-8d4a");
        assert_eq!(normalize_path("/teams/%zz"), "/teams/%zz");
        assert_eq!(normalize_path("/api/v1/users/me/"), "/api/v1/users/me/");
    }

    #[test]
    fn lookup_is_independent_of_the_concrete_ids() {
        let registry = registry();
        let first = registry
            .lookup(&format!("/api/v1/teams/{}", TEAM), "GET")
            .cloned();
        let second = registry
            .lookup(&format!("/api/v1/teams/{}", OTHER_TEAM), "get")
            .cloned();

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_path_or_method_is_absent() {
        let registry = registry();
        assert!(registry.lookup("/api/v1/unknown", "GET").is_none());
        assert!(registry
            .lookup(&format!("/api/v1/teams/{}", TEAM), "DELETE")
            .is_none());
    }

    #[test]
    fn team_scope_tracks_the_segment_after_teams() {
        let registry = registry();
        let path = format!("/api/v1/teams/{}/members/{}", TEAM, MEMBER);
        let endpoint = registry.lookup(&path, "PATCH").unwrap();

        assert!(endpoint.is_team_scoped());
        assert_eq!(endpoint.team_id(&path), Uuid::parse_str(TEAM).ok());

        let me = registry.lookup("/api/v1/users/me", "GET").unwrap();
        assert!(!me.is_team_scoped());
        assert_eq!(me.team_id("/api/v1/users/me"), None);
    }

    #[test]
    fn team_segment_ignores_query_string() {
        let registry = registry();
        let path = format!("/api/v1/teams/{}?expand=members", TEAM);
        let endpoint = registry.lookup(&path, "GET").unwrap();
        assert_eq!(endpoint.team_id(&path), Uuid::parse_str(TEAM).ok());
    }

    #[test]
    fn team_id_is_read_from_any_uuid_spelling() {
        let registry = registry();
        let team = Uuid::parse_str(TEAM).unwrap();
        for path in [
            format!("/api/v1/teams/{}", TEAM.to_uppercase()),
            format!("/api/v1/teams/{}", team.simple()),
            format!("/api/v1/teams/{}", team.braced()),
            format!("/api/v1/teams/{}", team.urn()),
        ] {
            let endpoint = registry.lookup(&path, "GET").unwrap();
            assert_eq!(endpoint.team_id(&path), Some(team), "{}", path);
        }
    }
}
