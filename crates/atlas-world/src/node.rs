//! The cached node record and its create/refresh protocol.
//!
//! A [`Node`] is built once from the first [`NodeDescriptor`] seen at its
//! coordinate and then refreshed in place on every later pass. Visited nodes
//! are frozen: their weight is pinned to [`VISITED_WEIGHT`] and later
//! descriptors no longer touch them.
//!
//! [`VISITED_WEIGHT`]: crate::scoring::VISITED_WEIGHT

use std::collections::{BTreeMap, BTreeSet};

use atlas_types::{
    BiomeId, BiomeType, ContentId, ContentType, Coordinate, EffectSource, MapType, ModifierId,
    ModifierType, NodeAddress, NodeDescriptor,
};
use tracing::warn;

use crate::catalog::TypeCatalog;
use crate::effects;
use crate::error::{CatalogTable, WorldError};
use crate::scoring::{self, ScoringSettings};

/// Everything node construction needs besides the descriptor itself.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// Catalog used to resolve ids.
    pub catalog: &'a TypeCatalog,
    /// Effect sources from the current snapshot.
    pub sources: &'a [EffectSource],
    /// Radius and tower classification.
    pub settings: &'a ScoringSettings,
}

/// A modifier aggregated onto a node from every tower in range.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    /// Modifier catalog key.
    pub modifier_id: ModifierId,
    /// Display name copied from the catalog.
    pub name: String,
    /// Display description copied from the catalog.
    pub description: String,
    /// Summed magnitude over all contributing sources.
    pub magnitude: f64,
    /// `modifier.weight * magnitude`.
    pub weight: f64,
    /// Whether the effect is eligible for display.
    pub enabled: bool,
    /// Whether the modifier's required content is present on the node.
    pub required_content_met: bool,
    /// Coordinates of the towers that contributed.
    pub sources: BTreeSet<Coordinate>,
}

impl Effect {
    /// A fresh effect seeded from its catalog entry and first source.
    pub fn seeded(modifier: &ModifierType, magnitude: f64, source: Coordinate) -> Self {
        Self {
            modifier_id: modifier.id.clone(),
            name: modifier.name.clone(),
            description: modifier.description.clone(),
            magnitude,
            weight: modifier.weight * magnitude,
            enabled: false,
            required_content_met: false,
            sources: BTreeSet::from([source]),
        }
    }
}

/// Result of refreshing an already-cached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRefresh {
    /// The node was already visited and was left untouched.
    Unchanged,
    /// The node just became visited; its weight is now the sentinel.
    MarkedVisited,
    /// Flags, content, effects, and weight were recomputed.
    Rescored,
}

/// Derived state for one discovered coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Grid position and cache key.
    pub coordinates: Coordinate,
    /// Opaque correlation id from the snapshot.
    pub address: NodeAddress,
    /// Opaque correlation id of the parent element.
    pub parent_address: NodeAddress,
    /// Whether the node is unlocked.
    pub is_unlocked: bool,
    /// Whether the node is visible.
    pub is_visible: bool,
    /// Whether the node has been visited.
    pub is_visited: bool,
    /// Whether the node is currently active.
    pub is_active: bool,
    /// Whether the map type is one of the configured tower types.
    pub is_tower: bool,
    /// Resolved map type (a placeholder when the catalog lacks it).
    pub map_type: MapType,
    /// Content present on the node, keyed by name.
    pub content: BTreeMap<ContentId, ContentType>,
    /// Biomes inherited from the map type.
    pub biomes: BTreeMap<BiomeId, BiomeType>,
    /// Aggregated tower modifiers keyed by modifier id.
    pub effects: BTreeMap<ModifierId, Effect>,
    /// Coordinates of linked cached nodes, at most four.
    pub neighbors: BTreeSet<Coordinate>,
    /// Composite desirability score.
    pub weight: f64,
    /// UI toggle: draw this tower's range.
    pub draw_towers: bool,
}

impl Node {
    /// Build a node from its first descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedDescriptor`] if the descriptor has no
    /// coordinate or no map id.
    pub fn from_descriptor(
        descriptor: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<Self, WorldError> {
        let (coordinates, raw_map_id) = validate(descriptor)?;
        let map_type = resolve_map_type(ctx.catalog, raw_map_id);

        let mut node = Self {
            coordinates,
            address: descriptor.address,
            parent_address: descriptor.parent_address,
            is_unlocked: descriptor.is_unlocked,
            is_visible: descriptor.is_visible,
            is_visited: descriptor.is_visited,
            is_active: descriptor.is_active,
            is_tower: ctx.settings.is_tower(&map_type, raw_map_id),
            content: resolve_content(ctx.catalog, &descriptor.content),
            biomes: resolve_biomes(ctx.catalog, &map_type),
            map_type,
            effects: BTreeMap::new(),
            neighbors: BTreeSet::new(),
            weight: 0.0,
            draw_towers: false,
        };

        // A claimed self-frozen tower no longer counts its own broadcast.
        let skip_own = node.is_visited && ctx.settings.is_self_frozen(&node.map_type, raw_map_id);
        effects::aggregate_effects(&mut node.effects, coordinates, &node.content, ctx, skip_own);
        node.weight = scoring::node_weight(&node);
        Ok(node)
    }

    /// Overwrite the mutable fields from a later descriptor.
    ///
    /// Neighbors and the `draw_towers` toggle are never touched here.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MalformedDescriptor`] if the descriptor is
    /// malformed or reports a different coordinate.
    pub fn refresh(
        &mut self,
        descriptor: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeRefresh, WorldError> {
        if self.is_visited {
            return Ok(NodeRefresh::Unchanged);
        }

        let (coordinates, raw_map_id) = validate(descriptor)?;
        if coordinates != self.coordinates {
            return Err(WorldError::MalformedDescriptor {
                reason: format!(
                    "descriptor for {coordinates} applied to node at {}",
                    self.coordinates
                ),
            });
        }

        self.address = descriptor.address;
        self.parent_address = descriptor.parent_address;
        self.is_unlocked = descriptor.is_unlocked;
        self.is_visible = descriptor.is_visible;
        self.is_visited = descriptor.is_visited;
        self.is_active = descriptor.is_active;
        self.map_type = resolve_map_type(ctx.catalog, raw_map_id);
        self.is_tower = ctx.settings.is_tower(&self.map_type, raw_map_id);
        self.content = resolve_content(ctx.catalog, &descriptor.content);
        self.biomes = resolve_biomes(ctx.catalog, &self.map_type);

        if self.is_visited {
            // Effects from the last unvisited pass stay readable but frozen.
            self.weight = scoring::node_weight(self);
            return Ok(NodeRefresh::MarkedVisited);
        }

        self.effects.clear();
        effects::aggregate_effects(
            &mut self.effects,
            self.coordinates,
            &self.content,
            ctx,
            false,
        );
        self.weight = scoring::node_weight(self);
        Ok(NodeRefresh::Rescored)
    }

    /// Display name of the node's map type.
    pub fn name(&self) -> &str {
        &self.map_type.name
    }

    /// Whether the node was entered but not completed.
    pub const fn is_failed(&self) -> bool {
        self.is_visited && !self.is_unlocked
    }

    /// Alias of [`is_failed`](Self::is_failed).
    pub const fn is_attempted(&self) -> bool {
        self.is_failed()
    }

    /// Whether any content on the node has a name containing `needle`.
    pub fn has_content(&self, needle: &str) -> bool {
        self.content
            .values()
            .any(|c| c.name.contains(needle) || c.id.as_str().contains(needle))
    }
}

/// Extract the coordinate and raw map id, rejecting records missing either.
pub(crate) fn validate(descriptor: &NodeDescriptor) -> Result<(Coordinate, &str), WorldError> {
    let Some(coordinates) = descriptor.coordinates else {
        return Err(WorldError::MalformedDescriptor {
            reason: String::from("missing coordinates"),
        });
    };
    match descriptor.map_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok((coordinates, raw)),
        _ => Err(WorldError::MalformedDescriptor {
            reason: format!("missing map id at {coordinates}"),
        }),
    }
}

fn resolve_map_type(catalog: &TypeCatalog, raw_map_id: &str) -> MapType {
    if let Some(found) = catalog.map_type(raw_map_id) {
        return found.clone();
    }
    let err = WorldError::MissingCatalogEntry {
        table: CatalogTable::MapType,
        id: raw_map_id.to_owned(),
    };
    warn!(%err, "Using placeholder map type");
    MapType::placeholder(raw_map_id)
}

fn resolve_content(catalog: &TypeCatalog, names: &[ContentId]) -> BTreeMap<ContentId, ContentType> {
    names
        .iter()
        .map(|id| {
            let content = catalog.content(id.as_str()).cloned().unwrap_or_else(|| {
                warn!(content = %id, "Unknown content, scoring it as zero");
                ContentType::placeholder(id)
            });
            (id.clone(), content)
        })
        .collect()
}

fn resolve_biomes(catalog: &TypeCatalog, map_type: &MapType) -> BTreeMap<BiomeId, BiomeType> {
    map_type
        .biomes
        .iter()
        .map(|id| {
            let biome = catalog.biome(id.as_str()).cloned().unwrap_or_else(|| {
                warn!(biome = %id, map_type = %map_type.id, "Unknown biome, scoring it as zero");
                BiomeType::placeholder(id)
            });
            (id.clone(), biome)
        })
        .collect()
}
