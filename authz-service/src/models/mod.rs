pub mod endpoint;
pub mod invitation;
pub mod membership;
pub mod role;
pub mod team;
pub mod user;

pub use endpoint::Endpoint;
pub use invitation::{Invitation, InvitationStatus};
pub use membership::{Membership, MembershipWithRole};
pub use role::{Grant, Role, RoleName};
pub use team::Team;
pub use user::User;
