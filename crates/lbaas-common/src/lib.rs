//! Common types for the load-balancer reconciliation engine.
//!
//! This crate provides the vocabulary shared by the agent library and its
//! test infrastructure:
//!
//! - [`error`]: the error taxonomy ([`LbaasError`], [`LbaasResult`])
//! - [`descriptor`]: flat device resource descriptors and the keys and
//!   kinds that address them on a device
//! - [`task`]: per-item outcomes and the batch result of one reconciliation
//!
//! # Architecture
//!
//! A reconciliation takes a desired service model and drives every device
//! of a fleet towards it:
//!
//! 1. Domain objects are mapped to [`Descriptor`]s (pure, deterministic)
//! 2. Resource managers compare descriptors with what the device holds
//! 3. Only differing attributes cause a create/update/delete call
//! 4. Each item's result is recorded as an [`ItemOutcome`]
//!
//! # Example
//!
//! ```
//! use lbaas_common::{descriptor, Descriptor, ResourceKind};
//!
//! let pool: Descriptor = descriptor! {
//!     "name" => "pool1",
//!     "partition" => "Project_tenant",
//!     "loadBalancingMode" => "round-robin",
//! };
//!
//! assert_eq!(pool.name(), Some("pool1"));
//! assert_eq!(ResourceKind::Pool.as_str(), "pool");
//! ```

pub mod descriptor;
pub mod error;
pub mod task;

// Re-export commonly used items at crate root
pub use descriptor::{Descriptor, ResourceKey, ResourceKind};
pub use error::{LbaasError, LbaasResult};
pub use task::{Action, BatchResult, ItemOutcome, Mutation, Phase};
