//! Services layer for membership-service.
//!
//! Credential verification, session issuing and revocation, account
//! changes and the identity store backends.

mod account;
mod credentials;
pub mod error;
pub mod revocation;
pub mod session;
pub mod store;

pub use account::AccountService;
pub use credentials::CredentialVerifier;
pub use error::ServiceError;
pub use revocation::{InMemoryRevocations, RedisRevocations, SessionRevocations};
pub use session::{IssuedSession, SessionClaims, SessionError, SessionIssuer};
pub use store::{
    DisabledIdentityStore, IdentityStore, InMemoryIdentityStore, PgIdentityStore, StoreError,
};
