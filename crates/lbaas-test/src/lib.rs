//! Integration test infrastructure for the load-balancer reconciliation engine
//!
//! Provides:
//! - Service model and subnet fixtures
//! - Collaborator doubles (recording L3 binding and a fault-injecting
//!   device client)
//! - Verification helpers over the in-memory fleet and its operation log

mod doubles;
pub mod fixtures;
mod verification;

pub use doubles::*;
pub use fixtures::*;
pub use verification::*;
