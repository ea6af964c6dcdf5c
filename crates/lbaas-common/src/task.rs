//! Per-item outcomes and batch results of one reconciliation.

use std::fmt;

use serde::Serialize;

use crate::descriptor::{ResourceKey, ResourceKind};
use crate::error::LbaasError;

/// The ordered phases of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Bind the load balancer VIP at the network layer
    BindVip,
    /// Create or update virtual servers
    ListenersCreated,
    /// Create or update pools and attach them to listeners
    PoolsCreated,
    /// Create, update or delete health monitors
    Monitors,
    /// Create, update or delete pool members
    Members,
    /// Detach and delete pools
    PoolsDeleted,
    /// Delete virtual servers
    ListenersDeleted,
    /// Unbind the load balancer VIP
    UnbindVip,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 8] = [
        Phase::BindVip,
        Phase::ListenersCreated,
        Phase::PoolsCreated,
        Phase::Monitors,
        Phase::Members,
        Phase::PoolsDeleted,
        Phase::ListenersDeleted,
        Phase::UnbindVip,
    ];

    /// Returns the phase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BindVip => "bind_vip",
            Phase::ListenersCreated => "listeners_created",
            Phase::PoolsCreated => "pools_created",
            Phase::Monitors => "monitors",
            Phase::Members => "members",
            Phase::PoolsDeleted => "pools_deleted",
            Phase::ListenersDeleted => "listeners_deleted",
            Phase::UnbindVip => "unbind_vip",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Object created
    Created,
    /// Object attributes changed
    Updated,
    /// Object deleted
    Deleted,
}

/// One change made on a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Mutation {
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource address
    pub key: ResourceKey,
    /// What happened to it
    pub action: Action,
}

impl Mutation {
    /// Creates a new mutation record.
    pub fn new(kind: ResourceKind, key: ResourceKey, action: Action) -> Self {
        Self { kind, key, action }
    }
}

/// Result of processing one item of one phase on one device.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Device hostname (None for network-layer phases)
    pub device: Option<String>,
    /// Phase the item belongs to
    pub phase: Phase,
    /// Service model id of the item
    pub item: String,
    /// Mutations performed, or the error that stopped the item
    pub result: Result<Vec<Mutation>, LbaasError>,
}

impl ItemOutcome {
    /// Returns true if the item completed without error.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the error, if the item failed.
    pub fn error(&self) -> Option<&LbaasError> {
        self.result.as_ref().err()
    }
}

/// Collected outcomes of one reconciliation call.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an item outcome.
    pub fn push(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    /// Outcomes that ended in an error.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Returns true if no item failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_success)
    }

    /// All mutations performed, in order.
    pub fn mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
    }

    /// Number of mutating device calls made.
    pub fn mutation_count(&self) -> usize {
        self.mutations().count()
    }

    /// Outcomes of one phase.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(move |o| o.phase == phase)
    }

    /// Returns the number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
