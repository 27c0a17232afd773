//! Proximity aggregation of tower modifiers onto nodes.
//!
//! Every effect source within the configured radius of a node contributes
//! each of its modifier payloads to the node's effect table:
//!
//! 1. sources outside the radius are ignored;
//! 2. payloads with a zero or non-finite magnitude, or a modifier id the
//!    catalog does not know, are skipped;
//! 3. a payload accumulates into the existing [`Effect`] for its modifier,
//!    unless that source already contributed to it;
//! 4. afterwards every effect is re-gated on its required content and its
//!    weight recomputed from the summed magnitude.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use atlas_types::{ContentId, ContentType, Coordinate, ModifierId, ModifierType};
use tracing::{debug, warn};

use crate::catalog::TypeCatalog;
use crate::node::{Effect, Node, NodeContext};

/// Aggregate every in-range source into `effects`.
///
/// With `skip_own_source` set, a source located at `at` itself is ignored.
/// Returns the number of payloads that contributed.
pub fn aggregate_effects(
    effects: &mut BTreeMap<ModifierId, Effect>,
    at: Coordinate,
    content: &BTreeMap<ContentId, ContentType>,
    ctx: &NodeContext<'_>,
    skip_own_source: bool,
) -> usize {
    let mut applied: usize = 0;
    let radius = ctx.settings.effect_radius;

    for source in ctx
        .sources
        .iter()
        .filter(|s| s.coordinates.within_radius(at, radius))
    {
        if skip_own_source && source.coordinates == at {
            continue;
        }

        for payload in &source.modifiers {
            if !payload.magnitude.is_finite() {
                warn!(
                    source = %source.coordinates,
                    modifier = %payload.modifier_id,
                    "Skipping non-finite modifier magnitude"
                );
                continue;
            }
            if payload.magnitude.abs() < f64::EPSILON {
                continue;
            }
            let Some(modifier) = ctx.catalog.modifier(payload.modifier_id.as_str()) else {
                debug!(modifier = %payload.modifier_id, "Skipping modifier missing from catalog");
                continue;
            };

            match effects.entry(payload.modifier_id.clone()) {
                Entry::Occupied(mut slot) => {
                    let effect = slot.get_mut();
                    if effect.sources.insert(source.coordinates) {
                        effect.magnitude += payload.magnitude;
                        applied = applied.saturating_add(1);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(Effect::seeded(modifier, payload.magnitude, source.coordinates));
                    applied = applied.saturating_add(1);
                }
            }
        }
    }

    regate_effects(effects, content, ctx.catalog);
    applied
}

/// Recompute `enabled`, `required_content_met`, and `weight` on every effect.
pub fn regate_effects(
    effects: &mut BTreeMap<ModifierId, Effect>,
    content: &BTreeMap<ContentId, ContentType>,
    catalog: &TypeCatalog,
) {
    for effect in effects.values_mut() {
        let Some(modifier) = catalog.modifier(effect.modifier_id.as_str()) else {
            effect.enabled = false;
            effect.required_content_met = false;
            continue;
        };
        effect.required_content_met = required_content_present(modifier, content);
        effect.enabled = modifier.show_on_map && effect.required_content_met;
        effect.weight = modifier.weight * effect.magnitude;
    }
}

/// Whether the modifier is ungated or some content name contains its
/// required content.
pub fn required_content_present(
    modifier: &ModifierType,
    content: &BTreeMap<ContentId, ContentType>,
) -> bool {
    match modifier.required_content.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(required) => content
            .values()
            .any(|c| c.name.contains(required) || c.id.as_str().contains(required)),
    }
}

/// Enabled effects on `node` whose magnitude reaches the modifier's
/// `min_value_to_show`.
pub fn displayable_effects<'a>(
    node: &'a Node,
    catalog: &'a TypeCatalog,
) -> impl Iterator<Item = &'a Effect> + 'a {
    node.effects.values().filter(move |effect| {
        effect.enabled
            && catalog
                .modifier(effect.modifier_id.as_str())
                .is_some_and(|m| effect.magnitude >= m.min_value_to_show)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atlas_types::{CatalogTables, EffectSource, ModifierPayload, NodeDescriptor};

    use super::*;
    use crate::catalog::tests::{content, map_type, modifier};
    use crate::scoring::ScoringSettings;

    fn catalog() -> TypeCatalog {
        let mut hidden = modifier("MapHiddenBonus", 1.0, None);
        hidden.show_on_map = false;
        let mut rare = modifier("MapRareMonsters", 2.0, None);
        rare.min_value_to_show = 5.0;
        TypeCatalog::from_tables(CatalogTables {
            map_types: vec![map_type("MapSwamp", 1.0, &[])],
            content: vec![content("Breach", 3.0), content("Expedition", 2.0)],
            biomes: Vec::new(),
            modifiers: vec![
                modifier("MapBreachChance", 1.5, Some("Breach")),
                modifier("MapPackSize", 0.5, None),
                hidden,
                rare,
            ],
        })
        .unwrap()
    }

    fn content_of(names: &[&str], catalog: &TypeCatalog) -> BTreeMap<ContentId, ContentType> {
        names
            .iter()
            .filter_map(|n| catalog.content(n).map(|c| (ContentId::new(*n), c.clone())))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn only_sources_within_radius_contribute() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![
            EffectSource::new(
                Coordinate::new(11, 0),
                vec![ModifierPayload::new("MapPackSize", 2.0)],
            ),
            EffectSource::new(
                Coordinate::new(0, 12),
                vec![ModifierPayload::new("MapPackSize", 7.0)],
            ),
        ];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let mut effects = BTreeMap::new();
        let applied =
            aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        assert_eq!(applied, 1);
        let effect = effects.get("MapPackSize");
        assert!(effect.is_some_and(|e| approx(e.magnitude, 2.0) && approx(e.weight, 1.0)));
    }

    #[test]
    fn magnitudes_accumulate_across_sources() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![
            EffectSource::new(
                Coordinate::new(1, 0),
                vec![ModifierPayload::new("MapPackSize", 2.0)],
            ),
            EffectSource::new(
                Coordinate::new(0, 1),
                vec![ModifierPayload::new("MapPackSize", 3.0)],
            ),
        ];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let mut effects = BTreeMap::new();
        aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        assert_eq!(effects.len(), 1);
        let effect = effects.get("MapPackSize");
        assert!(effect.is_some_and(|e| approx(e.magnitude, 5.0) && e.sources.len() == 2));
    }

    #[test]
    fn reprocessing_a_source_does_not_double_count() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![EffectSource::new(
            Coordinate::new(2, 2),
            vec![ModifierPayload::new("MapPackSize", 4.0)],
        )];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let mut effects = BTreeMap::new();
        aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        let again =
            aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        assert_eq!(again, 0);
        assert!(effects.get("MapPackSize").is_some_and(|e| approx(e.magnitude, 4.0)));
    }

    #[test]
    fn required_content_gates_enabled_flag() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![EffectSource::new(
            Coordinate::new(1, 1),
            vec![ModifierPayload::new("MapBreachChance", 9.0)],
        )];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };

        let mut without = BTreeMap::new();
        let expedition = content_of(&["Expedition"], &catalog);
        aggregate_effects(&mut without, Coordinate::new(0, 0), &expedition, &ctx, false);
        let effect = without.get("MapBreachChance");
        assert!(effect.is_some_and(|e| !e.enabled && !e.required_content_met));

        let mut with = BTreeMap::new();
        let breach = content_of(&["Breach"], &catalog);
        aggregate_effects(&mut with, Coordinate::new(0, 0), &breach, &ctx, false);
        let effect = with.get("MapBreachChance");
        assert!(effect.is_some_and(|e| e.enabled && e.required_content_met));
    }

    #[test]
    fn hidden_modifier_is_disabled_but_still_gated_for_scoring() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![EffectSource::new(
            Coordinate::new(1, 1),
            vec![ModifierPayload::new("MapHiddenBonus", 1.0)],
        )];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let mut effects = BTreeMap::new();
        aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        let effect = effects.get("MapHiddenBonus");
        assert!(effect.is_some_and(|e| !e.enabled && e.required_content_met));
    }

    #[test]
    fn bad_payloads_are_skipped() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![EffectSource::new(
            Coordinate::new(1, 1),
            vec![
                ModifierPayload::new("MapPackSize", f64::NAN),
                ModifierPayload::new("MapPackSize", 0.0),
                ModifierPayload::new("MapUnknownModifier", 3.0),
            ],
        )];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let mut effects = BTreeMap::new();
        let applied =
            aggregate_effects(&mut effects, Coordinate::new(0, 0), &BTreeMap::new(), &ctx, false);
        assert_eq!(applied, 0);
        assert!(effects.is_empty());
    }

    #[test]
    fn display_threshold_filters_small_magnitudes() {
        let catalog = catalog();
        let settings = ScoringSettings::default();
        let sources = vec![EffectSource::new(
            Coordinate::new(1, 1),
            vec![
                ModifierPayload::new("MapRareMonsters", 2.0),
                ModifierPayload::new("MapPackSize", 1.0),
            ],
        )];
        let ctx = NodeContext {
            catalog: &catalog,
            sources: &sources,
            settings: &settings,
        };
        let descriptor = NodeDescriptor::new(Coordinate::new(0, 0), "MapSwamp");
        let node = Node::from_descriptor(&descriptor, &ctx).unwrap();
        let shown: Vec<&str> = displayable_effects(&node, &catalog)
            .map(|e| e.modifier_id.as_str())
            .collect();
        assert_eq!(shown, vec!["MapPackSize"]);
    }
}
