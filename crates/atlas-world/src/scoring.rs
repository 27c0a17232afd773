//! Weight composition for cached nodes.
//!
//! ```text
//! weight = map_type.weight
//!        + sum(content.weight)
//!        + sum(biome.weight)
//!        + sum(effect.weight for effects whose required content is present)
//! ```
//!
//! Visited nodes are pinned to [`VISITED_WEIGHT`], which is higher than any
//! attainable composite score. The sum is always recomputed from scratch;
//! contributions are never invalidated individually.

use std::collections::BTreeSet;

use atlas_types::MapType;
use serde::Serialize;

use crate::node::Node;

/// Sentinel weight of a visited node.
pub const VISITED_WEIGHT: f64 = 500.0;

/// Default tower proximity radius in grid units.
pub const DEFAULT_EFFECT_RADIUS: u32 = 11;

/// Map ids treated as towers unless configured otherwise.
pub const DEFAULT_TOWER_MAP_IDS: [&str; 5] = [
    "MapLostTowers",
    "MapMesa",
    "MapBluff",
    "MapAlpineRidge",
    "MapSinkingSpire",
];

/// Tower ids whose own broadcast freezes once the tower is visited.
pub const DEFAULT_SELF_FROZEN_TOWER_IDS: [&str; 1] = ["MapLostTowers"];

/// Radius and tower classification used while building nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringSettings {
    /// Inclusive Euclidean radius within which towers affect a node.
    pub effect_radius: u32,
    /// Map ids that classify a node as a tower.
    pub tower_map_ids: BTreeSet<String>,
    /// Tower ids whose self-applied effect freezes once visited.
    pub self_frozen_tower_ids: BTreeSet<String>,
}

impl ScoringSettings {
    /// Whether a node with this map type (or raw id) is a tower.
    pub fn is_tower(&self, map_type: &MapType, raw_map_id: &str) -> bool {
        self.tower_map_ids.contains(map_type.id.as_str()) || self.tower_map_ids.contains(raw_map_id)
    }

    /// Whether a visited node of this type stops counting its own broadcast.
    pub fn is_self_frozen(&self, map_type: &MapType, raw_map_id: &str) -> bool {
        self.self_frozen_tower_ids.contains(map_type.id.as_str())
            || self.self_frozen_tower_ids.contains(raw_map_id)
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            effect_radius: DEFAULT_EFFECT_RADIUS,
            tower_map_ids: DEFAULT_TOWER_MAP_IDS.iter().map(|s| (*s).to_owned()).collect(),
            self_frozen_tower_ids: DEFAULT_SELF_FROZEN_TOWER_IDS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }
}

/// Per-category contributions to a node's weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeightBreakdown {
    /// Base weight of the map type.
    pub map_type: f64,
    /// Sum over content.
    pub content: f64,
    /// Sum over biomes.
    pub biomes: f64,
    /// Sum over effects whose required content is present.
    pub effects: f64,
}

impl WeightBreakdown {
    /// Compute the breakdown for `node`, ignoring its visited state.
    pub fn of(node: &Node) -> Self {
        Self {
            map_type: node.map_type.weight,
            content: node.content.values().map(|c| c.weight).sum(),
            biomes: node.biomes.values().map(|b| b.weight).sum(),
            effects: node
                .effects
                .values()
                .filter(|e| e.required_content_met)
                .map(|e| e.weight)
                .sum(),
        }
    }

    /// Sum of all four contributions.
    pub fn total(&self) -> f64 {
        self.map_type + self.content + self.biomes + self.effects
    }
}

/// The node's weight: [`VISITED_WEIGHT`] when visited, the composite sum
/// otherwise.
pub fn node_weight(node: &Node) -> f64 {
    if node.is_visited {
        return VISITED_WEIGHT;
    }
    WeightBreakdown::of(node).total()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use atlas_types::{BiomeId, ContentId, Coordinate, ModifierId, NodeAddress};

    use super::*;
    use crate::catalog::tests::{biome, content, map_type};
    use crate::node::Effect;

    fn bare_node() -> Node {
        Node {
            coordinates: Coordinate::new(0, 0),
            address: NodeAddress::default(),
            parent_address: NodeAddress::default(),
            is_unlocked: false,
            is_visible: true,
            is_visited: false,
            is_active: false,
            is_tower: false,
            map_type: map_type("MapSwamp", 10.0, &["Swamp"]),
            content: BTreeMap::new(),
            biomes: BTreeMap::new(),
            effects: BTreeMap::new(),
            neighbors: BTreeSet::new(),
            weight: 0.0,
            draw_towers: false,
        }
    }

    fn effect(id: &str, weight: f64, gate: bool) -> Effect {
        Effect {
            modifier_id: ModifierId::new(id),
            name: id.to_owned(),
            description: String::new(),
            magnitude: 1.0,
            weight,
            enabled: gate,
            required_content_met: gate,
            sources: BTreeSet::new(),
        }
    }

    #[test]
    fn composition_sums_all_categories() {
        let mut node = bare_node();
        node.content.insert(ContentId::new("Breach"), content("Breach", 3.0));
        node.content.insert(ContentId::new("Boss"), content("Boss", 1.25));
        node.biomes.insert(BiomeId::new("Swamp"), biome("Swamp", 0.5));
        node.effects.insert(ModifierId::new("A"), effect("A", 2.0, true));
        node.effects.insert(ModifierId::new("B"), effect("B", 7.0, false));

        let breakdown = WeightBreakdown::of(&node);
        assert!((breakdown.content - 4.25).abs() < 1e-9);
        assert!((breakdown.effects - 2.0).abs() < 1e-9);
        assert!((node_weight(&node) - 16.75).abs() < 1e-9);
    }

    #[test]
    fn visited_node_uses_sentinel() {
        let mut node = bare_node();
        node.is_visited = true;
        assert!((node_weight(&node) - VISITED_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn default_settings_classify_towers() {
        let settings = ScoringSettings::default();
        let lost = map_type("MapLostTowers", 0.0, &[]);
        let swamp = map_type("MapSwamp", 0.0, &[]);
        assert!(settings.is_tower(&lost, "MapLostTowers"));
        assert!(settings.is_self_frozen(&lost, "MapLostTowers"));
        assert!(!settings.is_tower(&swamp, "MapSwamp"));
        // A placeholder still classifies through its raw id.
        assert!(settings.is_tower(&swamp, "MapMesa"));
        assert_eq!(settings.effect_radius, 11);
    }
}
