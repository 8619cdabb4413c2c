//! Shared setup for authz-service integration tests.
//!
//! Everything runs against the in-memory store and the recording mailer,
//! seeded from `data/access.yaml`.

#![allow(dead_code)]

use authz_service::{
    build_router,
    commands::{Command, CommandOutcome},
    config::{
        AccessConfig, AuthzConfig, DatabaseConfig, Environment, InvitationConfig, JwtConfig,
        RedisConfig, SecurityConfig,
    },
    models::{Invitation, Membership, RoleName, Team, User},
    services::{AccessSeed, JwtService, MockMailer},
    store::{
        AccessRepository, InMemoryStore, InvitationRepository, MembershipRepository,
        RoleRepository, UnitOfWork, UserRepository,
    },
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/jwt_private.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/jwt_public.pem");
pub const ACCESS_SEED: &str = include_str!("../../data/access.yaml");

pub const INVITATION_LINK_BASE: &str = "https://app.example.com/invitations";

/// Test application over the in-memory store.
pub struct TestApp {
    pub state: AppState,
    pub store: InMemoryStore,
    pub mailer: Arc<MockMailer>,
    pub router: Router,
    _key_files: (NamedTempFile, NamedTempFile),
}

fn key_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create key file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write key file");
    file
}

pub fn test_config(private_key_path: &str, public_key_path: &str) -> AuthzConfig {
    AuthzConfig {
        common: service_core::config::Config {
            port: 8080,
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        environment: Environment::Dev,
        service_name: "authz-service-test".to_string(),
        service_version: "test".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/authz_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost:6379".to_string(),
            mail_queue: "mail:test".to_string(),
        },
        jwt: JwtConfig {
            private_key_path: private_key_path.to_string(),
            public_key_path: public_key_path.to_string(),
            key_id: "authz-test".to_string(),
            access_token_expiry_minutes: 15,
        },
        access: AccessConfig {
            seed_path: "data/access.yaml".to_string(),
            seed_on_startup: false,
            team_segment: "teams".to_string(),
        },
        invitation: InvitationConfig {
            link_base_url: INVITATION_LINK_BASE.to_string(),
            expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        Self::with_access(store.clone(), Arc::new(store)).await
    }

    /// Use `access` for authorization reads instead of the store itself.
    pub async fn with_access(store: InMemoryStore, access: Arc<dyn AccessRepository>) -> Self {
        AccessSeed::parse(ACCESS_SEED)
            .expect("Failed to parse access seed")
            .apply(&store)
            .await
            .expect("Failed to apply access seed");

        let private_key = key_file(TEST_PRIVATE_KEY);
        let public_key = key_file(TEST_PUBLIC_KEY);
        let config = test_config(
            private_key.path().to_str().expect("Non-UTF-8 temp path"),
            public_key.path().to_str().expect("Non-UTF-8 temp path"),
        );

        let jwt = JwtService::new(&config.jwt).expect("Failed to create JWT service");
        let mailer = Arc::new(MockMailer::new());

        let state = AppState::build(
            config,
            jwt,
            Arc::new(store.clone()),
            access,
            mailer.clone(),
        )
        .await
        .expect("Failed to build app state");

        let router = build_router(state.clone());

        Self {
            state,
            store,
            mailer,
            router,
            _key_files: (private_key, public_key),
        }
    }

    pub async fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> User {
        let user = User::new(email.to_string(), first_name.to_string(), last_name.to_string());
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    /// Shared team owned by `owner`, created through the command bus.
    pub async fn create_team(&self, owner: Uuid, name: &str) -> Team {
        let outcome = self
            .state
            .bus
            .handle(Command::CreateTeam {
                team_id: Uuid::new_v4(),
                name: name.to_string(),
                description: String::new(),
                is_personal: false,
                actor: owner,
            })
            .await
            .unwrap();

        match outcome {
            CommandOutcome::Team(team) => team,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    /// Adds `user_id` to the team and returns the membership id.
    pub async fn add_member(&self, team_id: Uuid, user_id: Uuid, role: RoleName) -> Uuid {
        let mut tx = self.store.begin().await.unwrap();
        let role = tx.find_role_by_name(role).await.unwrap().unwrap();
        let membership = Membership::new(team_id, user_id, role.role_id);
        tx.insert_membership(&membership).await.unwrap();
        tx.commit().await.unwrap();
        membership.membership_id
    }

    pub async fn membership_id(&self, team_id: Uuid, user_id: Uuid) -> Uuid {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_membership_by_user(team_id, user_id)
            .await
            .unwrap()
            .unwrap()
            .membership_id
    }

    pub async fn role_of(&self, team_id: Uuid, user_id: Uuid) -> Option<String> {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_membership_by_user(team_id, user_id)
            .await
            .unwrap()
            .map(|m| m.role_name)
    }

    pub async fn role_id(&self, role: RoleName) -> Uuid {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_role_by_name(role).await.unwrap().unwrap().role_id
    }

    pub async fn insert_invitation(&self, invitation: &Invitation) {
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_invitation(invitation).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn find_invitation(&self, invitation_id: Uuid) -> Option<Invitation> {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_invitation(invitation_id).await.unwrap()
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .jwt
            .issue_access(user_id)
            .unwrap()
            .token
    }

    /// Send one request through the full router and decode the JSON body.
    /// An empty body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}
