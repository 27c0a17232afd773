//! Refresh trigger evaluation.
//!
//! The poll loop asks on every frame whether a refresh is due. The answer is
//! the first condition that holds, checked in this order:
//!
//! 1. an explicit request is outstanding;
//! 2. the player moved to a different area;
//! 3. the cache is empty while the world reports nodes;
//! 4. the world reports more nodes than the last pass saw;
//! 5. the refresh interval has elapsed (or no pass has run yet).

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// How much of the cache a pass rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshMode {
    /// Clear the cache on entry and rebuild every node.
    Full,
    /// Update cached nodes in place and add new ones.
    Incremental,
}

/// Why a refresh fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshTrigger {
    /// Someone called `request_refresh`.
    Explicit {
        /// Whether a full rebuild was requested.
        full: bool,
    },
    /// The provider reports a different area than the last pass.
    AreaChanged,
    /// Nothing is cached but the world has nodes.
    CacheEmpty,
    /// The world reports more nodes than the last pass saw.
    NodeCountGrew,
    /// The configured interval has elapsed since the last pass.
    IntervalElapsed,
}

impl RefreshTrigger {
    /// The mode a pass fired by this trigger runs in.
    pub const fn mode(self, rebuild_on_area_change: bool) -> RefreshMode {
        match self {
            Self::Explicit { full: true } => RefreshMode::Full,
            Self::AreaChanged if rebuild_on_area_change => RefreshMode::Full,
            _ => RefreshMode::Incremental,
        }
    }
}

/// Observations the trigger decision is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerInputs {
    /// Outstanding explicit request, and whether it asked for a full pass.
    pub explicit: Option<bool>,
    /// Whether the current area differs from the one the last pass saw.
    pub area_changed: bool,
    /// Number of cached nodes.
    pub cached_nodes: usize,
    /// Number of nodes the provider reports now.
    pub world_nodes: usize,
    /// Number of nodes the provider reported at the last pass.
    pub last_world_nodes: usize,
    /// Completion time of the last pass.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Minimum time between interval-triggered passes.
    pub interval: TimeDelta,
}

/// Return the first trigger that holds at `now`, if any.
pub fn evaluate(inputs: &TriggerInputs, now: DateTime<Utc>) -> Option<RefreshTrigger> {
    if let Some(full) = inputs.explicit {
        return Some(RefreshTrigger::Explicit { full });
    }
    if inputs.area_changed {
        return Some(RefreshTrigger::AreaChanged);
    }
    if inputs.cached_nodes == 0 && inputs.world_nodes > 0 {
        return Some(RefreshTrigger::CacheEmpty);
    }
    if inputs.world_nodes > inputs.last_world_nodes {
        return Some(RefreshTrigger::NodeCountGrew);
    }
    match inputs.last_refresh {
        None => Some(RefreshTrigger::IntervalElapsed),
        Some(last) if now.signed_duration_since(last) >= inputs.interval => {
            Some(RefreshTrigger::IntervalElapsed)
        }
        Some(_) => None,
    }
}
