pub mod auth;
pub mod authorize;
pub mod metrics;

pub use auth::{auth_middleware, extract_token, AuthUser};
pub use authorize::authorize_middleware;
pub use metrics::metrics_middleware;
