//! The coordinate-keyed node cache.
//!
//! [`NodeCache`] is an arena: nodes live in a `BTreeMap` keyed by their
//! coordinate, and everything that refers to a node (neighbor sets, UI
//! selections) holds the coordinate, never a pointer. Clearing the arena is
//! the only way a key goes stale.
//!
//! One `RwLock` guards the arena and the current [`WeightScale`]. Writers
//! hold it for a single discrete mutation (one insert, one in-place update,
//! one link pass), never for a whole refresh. Readers take the read lock
//! just long enough to copy what they need, so a reader may observe a pass
//! half-applied: some nodes refreshed, others not yet.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use atlas_types::{Coordinate, NodeDescriptor};
use parking_lot::RwLock;
use serde::Serialize;

use crate::adjacency::{self, AdjacencyIndex};
use crate::error::WorldError;
use crate::node::{self, Node, NodeContext, NodeRefresh};
use crate::stats::{PercentileSettings, WeightScale};

#[derive(Debug, Default)]
struct Arena {
    nodes: BTreeMap<Coordinate, Node>,
    scale: WeightScale,
}

/// Result of [`NodeCache::upsert_new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// The cached node (the pre-existing one if nothing was inserted).
    pub node: Node,
    /// Whether this call inserted the node.
    pub inserted: bool,
}

/// A node's position in the current ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedNode {
    /// Coordinate of the ranked node.
    pub coordinates: Coordinate,
    /// Raw weight.
    pub weight: f64,
    /// Weight scaled into `[0, 1]` by the current [`WeightScale`].
    pub normalized: f64,
}

/// Shared, coordinate-keyed store of derived node state.
#[derive(Debug, Default)]
pub struct NodeCache {
    inner: RwLock<Arena>,
}

impl NodeCache {
    /// Create an empty cache with the default fallback scale.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------
    // Core protocol
    // -------------------------------------------------------------------

    /// Copy of the node at `at`.
    pub fn get(&self, at: Coordinate) -> Option<Node> {
        self.inner.read().nodes.get(&at).cloned()
    }

    /// Whether a node is cached at `at`.
    pub fn contains(&self, at: Coordinate) -> bool {
        self.inner.read().nodes.contains_key(&at)
    }

    /// Insert a freshly built node unless one already exists at the
    /// descriptor's coordinate.
    ///
    /// The node is built outside the lock; the insert itself is an
    /// insert-if-absent under the write lock, so two racing callers end up
    /// with exactly one cached node.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedDescriptor`] if the descriptor cannot
    /// be turned into a node.
    pub fn upsert_new(
        &self,
        descriptor: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<Upserted, WorldError> {
        let (at, _) = node::validate(descriptor)?;
        if let Some(existing) = self.get(at) {
            return Ok(Upserted {
                node: existing,
                inserted: false,
            });
        }

        let built = Node::from_descriptor(descriptor, ctx)?;
        let mut arena = self.inner.write();
        match arena.nodes.entry(at) {
            Entry::Occupied(slot) => Ok(Upserted {
                node: slot.get().clone(),
                inserted: false,
            }),
            Entry::Vacant(slot) => Ok(Upserted {
                node: slot.insert(built).clone(),
                inserted: true,
            }),
        }
    }

    /// Refresh the cached node at `at` in place from a later descriptor.
    ///
    /// Visited nodes are frozen and answer [`NodeRefresh::Unchanged`]
    /// without being copied. Otherwise the new state is computed on a copy
    /// and swapped in under the write lock. Neighbors and the `draw_towers`
    /// toggle are carried over from the live record, since links may have
    /// been added meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NodeNotCached`] if nothing is cached at `at`
    /// (for instance because the cache was cleared mid-pass), or
    /// [`WorldError::MalformedDescriptor`] for a bad descriptor.
    pub fn refresh_existing(
        &self,
        at: Coordinate,
        descriptor: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeRefresh, WorldError> {
        let visited = self.inner.read().nodes.get(&at).map(|n| n.is_visited);
        match visited {
            None => return Err(WorldError::NodeNotCached(at)),
            Some(true) => return Ok(NodeRefresh::Unchanged),
            Some(false) => {}
        }

        let mut updated = self.get(at).ok_or(WorldError::NodeNotCached(at))?;
        let outcome = updated.refresh(descriptor, ctx)?;
        if outcome == NodeRefresh::Unchanged {
            return Ok(outcome);
        }

        let mut arena = self.inner.write();
        let slot = arena
            .nodes
            .get_mut(&at)
            .ok_or(WorldError::NodeNotCached(at))?;
        updated.neighbors = std::mem::take(&mut slot.neighbors);
        updated.draw_towers = slot.draw_towers;
        *slot = updated;
        Ok(outcome)
    }

    /// Run the adjacency builder for the node at `at`.
    ///
    /// Returns the number of neighbors added.
    pub fn link_neighbors(&self, at: Coordinate, index: &AdjacencyIndex) -> usize {
        let mut arena = self.inner.write();
        adjacency::link_node(&mut arena.nodes, at, index)
    }

    /// Drop every cached node.
    ///
    /// Invalidates all coordinate keys held elsewhere. The scale is left as
    /// is until the next recompute.
    pub fn clear(&self) {
        self.inner.write().nodes.clear();
    }

    /// Snapshot copy of every cached node, in coordinate order.
    pub fn values(&self) -> Vec<Node> {
        self.inner.read().nodes.values().cloned().collect()
    }

    /// Every cached coordinate, in order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.inner.read().nodes.keys().copied().collect()
    }

    /// Number of cached nodes.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    // -------------------------------------------------------------------
    // Scale
    // -------------------------------------------------------------------

    /// The scale computed by the last recompute.
    pub fn scale(&self) -> WeightScale {
        self.inner.read().scale
    }

    /// Recompute the scale over every non-visited node and store it.
    pub fn recompute_scale(&self, settings: &PercentileSettings) -> WeightScale {
        let mut arena = self.inner.write();
        let scale = WeightScale::compute(
            arena
                .nodes
                .values()
                .filter(|n| !n.is_visited)
                .map(|n| n.weight),
            settings,
        );
        arena.scale = scale;
        scale
    }

    /// The node's weight scaled into `[0, 1]`.
    pub fn normalized_weight(&self, at: Coordinate) -> Option<f64> {
        let arena = self.inner.read();
        arena.nodes.get(&at).map(|n| arena.scale.normalize(n.weight))
    }

    // -------------------------------------------------------------------
    // Reader queries
    // -------------------------------------------------------------------

    /// Resolve the neighbor keys of the node at `at` to node copies.
    ///
    /// Keys whose node has since been cleared are skipped.
    pub fn neighbors_of(&self, at: Coordinate) -> Vec<Node> {
        let arena = self.inner.read();
        arena
            .nodes
            .get(&at)
            .map(|node| {
                node.neighbors
                    .iter()
                    .filter_map(|c| arena.nodes.get(c).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nodes whose map name contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<Node> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.filtered(|n| n.name().to_lowercase().contains(&needle))
    }

    /// Nodes within `radius` of `center`, inclusive.
    pub fn nodes_in_range(&self, center: Coordinate, radius: u32) -> Vec<Node> {
        self.filtered(|n| n.coordinates.within_radius(center, radius))
    }

    /// All tower nodes.
    pub fn towers(&self) -> Vec<Node> {
        self.filtered(|n| n.is_tower)
    }

    /// Nodes carrying content whose name contains `name`.
    pub fn with_content(&self, name: &str) -> Vec<Node> {
        self.filtered(|n| n.has_content(name))
    }

    /// Up to `limit` non-visited nodes, best first.
    pub fn ranked(&self, limit: usize) -> Vec<RankedNode> {
        let arena = self.inner.read();
        let mut ranked: Vec<RankedNode> = arena
            .nodes
            .values()
            .filter(|n| !n.is_visited)
            .map(|n| RankedNode {
                coordinates: n.coordinates,
                weight: n.weight,
                normalized: arena.scale.normalize(n.weight),
            })
            .collect();
        drop(arena);
        ranked.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.coordinates.cmp(&b.coordinates))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Set the `draw_towers` toggle. Returns `false` if nothing is cached at
    /// `at`.
    pub fn set_draw_towers(&self, at: Coordinate, on: bool) -> bool {
        self.inner.write().nodes.get_mut(&at).is_some_and(|n| {
            n.draw_towers = on;
            true
        })
    }

    fn filtered(&self, keep: impl Fn(&Node) -> bool) -> Vec<Node> {
        self.inner
            .read()
            .nodes
            .values()
            .filter(|n| keep(n))
            .cloned()
            .collect()
    }
}
