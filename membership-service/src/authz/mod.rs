//! Path-based authorization decisions.

pub mod policy;

pub use policy::{Access, AuthorizationPolicy, Decision, GateState, PathPattern};
