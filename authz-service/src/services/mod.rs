//! Services layer: request-time authorization and the command bus.

pub mod bus;
pub mod decision;
pub mod endpoint_registry;
pub mod jwt;
pub mod mailer;
pub mod metrics;
pub mod permission;
pub mod seed;

pub use bus::{CommandBus, InvitationSettings};
pub use decision::{Decision, DecisionEngine, FORBIDDEN_MESSAGE};
pub use endpoint_registry::EndpointRegistry;
pub use jwt::{Credential, JwtService};
pub use mailer::{Mailer, MockMailer, RedisMailQueue};
pub use permission::PermissionResolver;
pub use seed::AccessSeed;
