//! HTTP handlers. Mutations map their request onto a [`crate::commands::Command`]
//! and hand it to the command bus.

pub mod authz;
pub mod health;
pub mod invitation;
pub mod metrics;
pub mod team;
pub mod user;
