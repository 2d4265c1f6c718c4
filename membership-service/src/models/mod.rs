//! Domain models for membership-service.

pub mod identity;
pub mod role;

pub use identity::{Identity, IdentityProfile, IdentityRow, IdentityStatus};
pub use role::{Role, UnknownRole};
