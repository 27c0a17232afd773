//! Neighbor resolution from the snapshot's connectivity list.
//!
//! The connectivity list declares, per node, up to four linked coordinates.
//! [`AdjacencyIndex`] folds it into an undirected lookup so a node finds both
//! the neighbors it declares and every node that declares it. Linking only
//! ever stores coordinate keys of nodes already present in the cache;
//! coordinates not yet cached are picked up by a later refresh.

use std::collections::{BTreeMap, BTreeSet};

use atlas_types::{Connection, Coordinate};
use tracing::debug;

use crate::node::Node;

/// Fixed branching factor of the atlas graph.
pub const MAX_NEIGHBORS: usize = 4;

/// Undirected view of the connectivity list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyIndex {
    links: BTreeMap<Coordinate, BTreeSet<Coordinate>>,
}

impl AdjacencyIndex {
    /// Build the index, dropping self-links and anything past the fourth
    /// declared neighbor.
    pub fn from_connections(connections: &[Connection]) -> Self {
        let mut links: BTreeMap<Coordinate, BTreeSet<Coordinate>> = BTreeMap::new();
        for connection in connections {
            if connection.linked.len() > MAX_NEIGHBORS {
                debug!(
                    origin = %connection.origin,
                    declared = connection.linked.len(),
                    "Ignoring links past the branching factor"
                );
            }
            for &linked in connection.linked.iter().take(MAX_NEIGHBORS) {
                if linked == connection.origin {
                    continue;
                }
                links.entry(connection.origin).or_default().insert(linked);
                links.entry(linked).or_default().insert(connection.origin);
            }
        }
        Self { links }
    }

    /// Coordinates linked to `at` in either direction.
    pub fn candidates(&self, at: Coordinate) -> impl Iterator<Item = Coordinate> + '_ {
        self.links.get(&at).into_iter().flatten().copied()
    }

    /// Number of coordinates with at least one link.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the index has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Link the node at `at` to every cached candidate, writing the
/// back-reference on the peer as well.
///
/// Short-circuits once the node holds [`MAX_NEIGHBORS`] neighbors. A link is
/// only written when both ends have room for it, so every stored edge is
/// symmetric. Returns the number of neighbors added to the node at `at`.
pub fn link_node(
    nodes: &mut BTreeMap<Coordinate, Node>,
    at: Coordinate,
    index: &AdjacencyIndex,
) -> usize {
    let candidates: Vec<Coordinate> = match nodes.get(&at) {
        Some(node) if node.neighbors.len() < MAX_NEIGHBORS => index
            .candidates(at)
            .filter(|c| *c != at && !node.neighbors.contains(c) && nodes.contains_key(c))
            .collect(),
        _ => return 0,
    };

    let mut added: usize = 0;
    for other in candidates {
        let Some(peer) = nodes.get_mut(&other) else {
            continue;
        };
        if !peer.neighbors.contains(&at) && peer.neighbors.len() >= MAX_NEIGHBORS {
            debug!(coord = %at, peer = %other, "Peer is full, link skipped");
            continue;
        }
        peer.neighbors.insert(at);

        let Some(node) = nodes.get_mut(&at) else {
            break;
        };
        node.neighbors.insert(other);
        added = added.saturating_add(1);
        if node.neighbors.len() >= MAX_NEIGHBORS {
            break;
        }
    }
    added
}
