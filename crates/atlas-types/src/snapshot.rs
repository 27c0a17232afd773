//! Raw records yielded by the world snapshot provider.
//!
//! Nothing here is validated: the upstream source is polled from live game
//! memory and may report missing coordinates, empty map ids, or garbage
//! magnitudes. Validation happens when a descriptor is turned into a node.

use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;
use crate::ids::{ContentId, ModifierId, NodeAddress};

/// One node as reported by the world snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Grid position, `None` when it could not be read.
    pub coordinates: Option<Coordinate>,
    /// Opaque correlation id of the node.
    #[serde(default)]
    pub address: NodeAddress,
    /// Opaque correlation id of the node's parent element.
    #[serde(default)]
    pub parent_address: NodeAddress,
    /// Raw map identifier, `None` when it could not be read.
    pub map_id: Option<String>,
    /// Whether the node is unlocked.
    #[serde(default)]
    pub is_unlocked: bool,
    /// Whether the node is visible.
    #[serde(default)]
    pub is_visible: bool,
    /// Whether the node has been visited.
    #[serde(default)]
    pub is_visited: bool,
    /// Whether the node is currently active.
    #[serde(default)]
    pub is_active: bool,
    /// Names of the content present on the node.
    #[serde(default)]
    pub content: Vec<ContentId>,
}

impl NodeDescriptor {
    /// A visible, locked, unvisited descriptor with no content.
    pub fn new(coordinates: Coordinate, map_id: impl Into<String>) -> Self {
        Self {
            coordinates: Some(coordinates),
            map_id: Some(map_id.into()),
            is_visible: true,
            ..Self::default()
        }
    }

    /// Set the visited flag.
    #[must_use]
    pub fn visited(mut self, visited: bool) -> Self {
        self.is_visited = visited;
        self
    }

    /// Set the unlocked flag.
    #[must_use]
    pub fn unlocked(mut self, unlocked: bool) -> Self {
        self.is_unlocked = unlocked;
        self
    }

    /// Append a content name.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<ContentId>) -> Self {
        self.content.push(content.into());
        self
    }
}

/// Connectivity record: a node and the coordinates it links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The declaring node.
    pub origin: Coordinate,
    /// Linked coordinates, at most four are meaningful.
    pub linked: Vec<Coordinate>,
}

impl Connection {
    /// Create a connection record.
    pub const fn new(origin: Coordinate, linked: Vec<Coordinate>) -> Self {
        Self { origin, linked }
    }
}

/// One modifier carried by an effect source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierPayload {
    /// Modifier catalog key.
    pub modifier_id: ModifierId,
    /// Magnitude contributed to every node in range.
    pub magnitude: f64,
}

impl ModifierPayload {
    /// Create a payload.
    pub fn new(modifier_id: impl Into<ModifierId>, magnitude: f64) -> Self {
        Self {
            modifier_id: modifier_id.into(),
            magnitude,
        }
    }
}

/// A tower broadcasting modifiers to nearby nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSource {
    /// Position of the broadcasting tower.
    pub coordinates: Coordinate,
    /// Modifiers it broadcasts.
    pub modifiers: Vec<ModifierPayload>,
}

impl EffectSource {
    /// Create an effect source.
    pub const fn new(coordinates: Coordinate, modifiers: Vec<ModifierPayload>) -> Self {
        Self {
            coordinates,
            modifiers,
        }
    }
}
