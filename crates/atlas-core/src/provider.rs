//! World snapshot provider trait and in-memory implementation.
//!
//! The refresh engine never talks to the game directly. It polls a
//! [`WorldSnapshotProvider`] for the raw node descriptors, the connectivity
//! list, and the tower effect sources. Each call returns an owned copy;
//! successive calls during one pass may observe different world states and
//! the engine tolerates that.
//!
//! [`StaticSnapshotProvider`] holds the three lists in memory and lets a
//! test (or a replay harness) swap them between passes.

use atlas_types::{AreaId, Connection, EffectSource, NodeDescriptor};
use parking_lot::RwLock;

/// A source of world snapshots.
///
/// Implementations must be shareable across the poll loop and the
/// background refresh task.
pub trait WorldSnapshotProvider: Send + Sync {
    /// Every node descriptor currently known to the world.
    fn node_descriptors(&self) -> Vec<NodeDescriptor>;

    /// The connectivity list: per node, the coordinates it links to.
    fn connections(&self) -> Vec<Connection>;

    /// Tower effect sources with their modifier payloads.
    fn effect_sources(&self) -> Vec<EffectSource>;

    /// Identifier of the area the player is currently in, if known.
    ///
    /// A change of area invalidates every cached coordinate.
    fn current_area(&self) -> Option<AreaId> {
        None
    }

    /// Number of nodes the world currently reports.
    ///
    /// Polled on every trigger evaluation, so implementations with a cheaper
    /// count than materializing every descriptor should override it.
    fn node_count(&self) -> usize {
        self.node_descriptors().len()
    }
}

#[derive(Debug, Default)]
struct SnapshotState {
    descriptors: Vec<NodeDescriptor>,
    connections: Vec<Connection>,
    sources: Vec<EffectSource>,
    area: Option<AreaId>,
}

/// An in-memory provider whose contents can be replaced at any time.
#[derive(Debug, Default)]
pub struct StaticSnapshotProvider {
    state: RwLock<SnapshotState>,
}

impl StaticSnapshotProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with the given descriptors and no links or towers.
    pub fn with_descriptors(descriptors: Vec<NodeDescriptor>) -> Self {
        let provider = Self::new();
        provider.set_descriptors(descriptors);
        provider
    }

    /// Replace the node descriptors.
    pub fn set_descriptors(&self, descriptors: Vec<NodeDescriptor>) {
        self.state.write().descriptors = descriptors;
    }

    /// Append a single descriptor.
    pub fn push_descriptor(&self, descriptor: NodeDescriptor) {
        self.state.write().descriptors.push(descriptor);
    }

    /// Replace the connectivity list.
    pub fn set_connections(&self, connections: Vec<Connection>) {
        self.state.write().connections = connections;
    }

    /// Replace the effect sources.
    pub fn set_effect_sources(&self, sources: Vec<EffectSource>) {
        self.state.write().sources = sources;
    }

    /// Set the current area.
    pub fn set_area(&self, area: Option<AreaId>) {
        self.state.write().area = area;
    }

    /// Apply `edit` to every stored descriptor.
    pub fn update_descriptors(&self, edit: impl FnMut(&mut NodeDescriptor)) {
        self.state.write().descriptors.iter_mut().for_each(edit);
    }
}

impl WorldSnapshotProvider for StaticSnapshotProvider {
    fn node_descriptors(&self) -> Vec<NodeDescriptor> {
        self.state.read().descriptors.clone()
    }

    fn connections(&self) -> Vec<Connection> {
        self.state.read().connections.clone()
    }

    fn effect_sources(&self) -> Vec<EffectSource> {
        self.state.read().sources.clone()
    }

    fn current_area(&self) -> Option<AreaId> {
        self.state.read().area
    }

    fn node_count(&self) -> usize {
        self.state.read().descriptors.len()
    }
}
