pub mod commands;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AuthzConfig;
use crate::middleware::{auth_middleware, authorize_middleware, metrics_middleware};
use crate::services::{
    CommandBus, DecisionEngine, EndpointRegistry, InvitationSettings, JwtService, Mailer,
    PermissionResolver,
};
use crate::store::{AccessRepository, UnitOfWork};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub jwt: JwtService,
    pub engine: DecisionEngine,
    pub bus: CommandBus,
    pub access: Arc<dyn AccessRepository>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Wire the engine and the bus over one store.
    ///
    /// The endpoint registry is built here from the stored endpoints and is
    /// not refreshed afterwards.
    pub async fn build(
        config: AuthzConfig,
        jwt: JwtService,
        uow: Arc<dyn UnitOfWork>,
        access: Arc<dyn AccessRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppError> {
        let endpoints = access.list_endpoints().await?;
        let registry = EndpointRegistry::new(endpoints, &config.access.team_segment);
        tracing::info!(endpoints = registry.len(), "Endpoint registry built");

        let engine = DecisionEngine::new(
            Arc::new(registry),
            PermissionResolver::new(access.clone()),
        );
        let bus = CommandBus::new(
            uow,
            mailer.clone(),
            InvitationSettings::from(&config.invitation),
        );

        Ok(Self {
            config,
            jwt,
            engine,
            bus,
            access,
            mailer,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    // Authenticated API. Layers run bottom-up: auth, then the authorization decision.
    let api = Router::new()
        .route("/api/v1/teams", post(handlers::team::create_team))
        .route("/api/v1/teams/:team_id", patch(handlers::team::update_team))
        .route(
            "/api/v1/teams/:team_id/last-active",
            put(handlers::team::update_last_active_team),
        )
        .route(
            "/api/v1/teams/:team_id/avatar",
            put(handlers::team::update_team_avatar).delete(handlers::team::delete_team_avatar),
        )
        .route(
            "/api/v1/teams/:team_id/members/:membership_id",
            patch(handlers::team::change_member_role).delete(handlers::team::delete_team_member),
        )
        .route(
            "/api/v1/teams/:team_id/invitations",
            post(handlers::invitation::invite_members),
        )
        .route(
            "/api/v1/teams/:team_id/invitations/:invitation_id",
            axum::routing::delete(handlers::invitation::delete_invitation),
        )
        .route(
            "/api/v1/teams/:team_id/invitations/:invitation_id/resend",
            post(handlers::invitation::resend_invitation),
        )
        .route(
            "/api/v1/invitations/:invitation_id",
            patch(handlers::invitation::answer_invitation),
        )
        .route(
            "/api/v1/users/me",
            patch(handlers::user::update_me).delete(handlers::user::delete_me),
        )
        .route(
            "/api/v1/users/me/avatar",
            put(handlers::user::update_my_avatar).delete(handlers::user::delete_my_avatar),
        )
        .route_layer(from_fn_with_state(state.clone(), authorize_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.security.allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(handlers::authz::USER_ID_HEADER),
            HeaderName::from_static(service_core::middleware::tracing::REQUEST_ID_HEADER),
        ]);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/authz/check", post(handlers::authz::check))
        .merge(api)
        // Inside routing so the matched route template is available
        .route_layer(from_fn(metrics_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
}

/// `*` allows any origin. Unparseable entries are logged and skipped.
fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }

    AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
            None
        }
    }))
}
