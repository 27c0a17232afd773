//! End-to-end refresh cycles against an in-memory world.
//!
//! Each test builds a catalog from JSON tables, feeds descriptors through a
//! [`StaticSnapshotProvider`], and drives the [`RefreshEngine`] the way the
//! overlay's poll loop does.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::arithmetic_side_effects
)]

use std::sync::{Arc, Barrier};

use atlas_core::{
    AtlasConfig, RefreshEngine, RefreshMode, RefreshTicket, RefreshTrigger,
    StaticSnapshotProvider, WorldSnapshotProvider,
};
use atlas_types::{
    AreaId, CatalogTables, Connection, Coordinate, EffectSource, ModifierPayload, NodeDescriptor,
};
use atlas_world::{NodeCache, TypeCatalog, VISITED_WEIGHT};
use chrono::Utc;
use parking_lot::Mutex;

const TABLES: &str = r#"{
  "map_types": [
    { "id": "MapSwamp", "name": "Swamp", "weight": 10.0, "biomes": ["Water"] },
    { "id": "MapForest", "name": "Forest", "weight": 2.0, "patterns": ["^MapForest(Uber)?$"] },
    { "id": "MapMesa", "name": "Mesa", "weight": 0.5 }
  ],
  "content": [
    { "id": "Breach", "name": "Breach", "weight": 3.0 }
  ],
  "biomes": [
    { "id": "Water", "name": "Water", "weight": 0.0 }
  ],
  "modifiers": [
    { "id": "MapBreachChance", "name": "Breach Chance", "weight": 1.5, "required_content": "Breach" }
  ]
}"#;

fn catalog() -> Arc<TypeCatalog> {
    let tables: CatalogTables = serde_json::from_str(TABLES).expect("catalog tables parse");
    Arc::new(TypeCatalog::from_tables(tables).expect("catalog builds"))
}

fn c(x: i32, y: i32) -> Coordinate {
    Coordinate::new(x, y)
}

fn engine_over(provider: Arc<dyn WorldSnapshotProvider>) -> Arc<RefreshEngine> {
    Arc::new(RefreshEngine::new(
        Arc::new(NodeCache::new()),
        provider,
        catalog(),
        &AtlasConfig::default(),
    ))
}

fn tower_at(at: Coordinate, magnitude: f64) -> EffectSource {
    EffectSource::new(at, vec![ModifierPayload::new("MapBreachChance", magnitude)])
}

async fn finish(ticket: RefreshTicket) -> atlas_core::RefreshReport {
    match ticket {
        RefreshTicket::Started(handle) => handle.await.expect("refresh task joins"),
        RefreshTicket::Coalesced => panic!("expected a new run"),
    }
}

#[tokio::test]
async fn scenario_weight_and_visited_flip() {
    let provider = Arc::new(StaticSnapshotProvider::with_descriptors(vec![
        NodeDescriptor::new(c(0, 0), "MapSwamp").with_content("Breach"),
        NodeDescriptor::new(c(5, 0), "MapMesa"),
        NodeDescriptor::new(c(0, 12), "MapSwamp").with_content("Breach"),
    ]));
    provider.set_effect_sources(vec![tower_at(c(5, 0), 2.0)]);
    let engine = engine_over(provider.clone());

    let report = finish(engine.spawn_refresh(RefreshMode::Incremental).unwrap()).await;
    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 0);

    let cache = engine.cache();
    // 10 (map) + 3 (content) + 1.5 * 2 (effect) = 16.
    let scored = cache.get(c(0, 0)).unwrap();
    assert!((scored.weight - 16.0).abs() < 1e-9);
    // (0, 12) is 13 units from the tower: no effect.
    let far = cache.get(c(0, 12)).unwrap();
    assert!((far.weight - 13.0).abs() < 1e-9);
    assert!(far.effects.is_empty());
    // The tower reaches itself but has no Breach to satisfy the gate.
    let tower = cache.get(c(5, 0)).unwrap();
    assert!(tower.is_tower);
    assert!((tower.weight - 0.5).abs() < 1e-9);

    provider.update_descriptors(|d| {
        if d.coordinates == Some(c(0, 0)) {
            d.is_visited = true;
        }
    });
    let report = finish(engine.spawn_refresh(RefreshMode::Incremental).unwrap()).await;
    assert_eq!(report.created, 0);
    assert_eq!(report.refreshed, 3);

    let visited = cache.get(c(0, 0)).unwrap();
    assert_eq!(visited.weight, VISITED_WEIGHT);
    assert!(visited.is_failed());
    assert!(cache.scale().max_weight < VISITED_WEIGHT);
    assert!(cache.ranked(10).iter().all(|r| r.coordinates != c(0, 0)));

    // Once visited, later passes leave the node alone.
    let report = engine.refresh_blocking(RefreshMode::Incremental).unwrap();
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn malformed_descriptors_are_skipped_not_fatal() {
    let provider = Arc::new(StaticSnapshotProvider::with_descriptors(vec![
        NodeDescriptor::new(c(0, 0), "MapSwamp"),
        NodeDescriptor::new(c(1, 0), "  "),
        NodeDescriptor {
            coordinates: None,
            ..NodeDescriptor::new(c(2, 0), "MapSwamp")
        },
        NodeDescriptor::new(c(3, 0), "MapForestUber"),
        NodeDescriptor::new(c(4, 0), "MapNobodyKnows"),
    ]));
    let engine = engine_over(provider);

    let report = finish(engine.spawn_refresh(RefreshMode::Incremental).unwrap()).await;
    assert_eq!(report.failed, 2);
    assert_eq!(report.created, 3);

    let cache = engine.cache();
    // Resolved through the map type's pattern.
    assert_eq!(cache.get(c(3, 0)).unwrap().map_type.id.as_str(), "MapForest");
    // Unknown map types get a zero-weight placeholder.
    assert_eq!(cache.get(c(4, 0)).unwrap().weight, 0.0);
}

/// Blocks the first `node_descriptors` call until released.
struct GatedProvider {
    inner: StaticSnapshotProvider,
    gate: Mutex<Option<(Arc<Barrier>, Arc<Barrier>)>>,
}

impl WorldSnapshotProvider for GatedProvider {
    fn node_descriptors(&self) -> Vec<NodeDescriptor> {
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            entered.wait();
            release.wait();
        }
        self.inner.node_descriptors()
    }

    fn connections(&self) -> Vec<Connection> {
        self.inner.connections()
    }

    fn effect_sources(&self) -> Vec<EffectSource> {
        self.inner.effect_sources()
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requests_during_refresh_coalesce_into_one_pass() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let provider = Arc::new(GatedProvider {
        inner: StaticSnapshotProvider::with_descriptors(vec![
            NodeDescriptor::new(c(0, 0), "MapSwamp"),
            NodeDescriptor::new(c(1, 0), "MapForest"),
        ]),
        gate: Mutex::new(Some((entered.clone(), release.clone()))),
    });
    let engine = engine_over(provider);

    let ticket = engine.spawn_refresh(RefreshMode::Incremental).unwrap();
    tokio::task::spawn_blocking(move || entered.wait())
        .await
        .unwrap();

    // The first pass is parked inside the provider.
    assert!(engine.is_refreshing());
    for mode in [RefreshMode::Incremental, RefreshMode::Full, RefreshMode::Incremental] {
        assert!(matches!(
            engine.spawn_refresh(mode).unwrap(),
            RefreshTicket::Coalesced
        ));
    }
    assert!(engine.refresh_blocking(RefreshMode::Incremental).is_none());
    assert!(engine.poll(Utc::now()).unwrap().is_none());

    tokio::task::spawn_blocking(move || release.wait())
        .await
        .unwrap();
    let report = finish(ticket).await;

    assert_eq!(report.passes, 2);
    assert_eq!(report.mode, RefreshMode::Full);
    // The coalesced full pass cleared and rebuilt both nodes.
    assert_eq!(report.created, 4);
    assert!(!engine.is_refreshing());
    assert_eq!(engine.cache().len(), 2);
    assert_eq!(engine.last_report(), Some(report));
}

/// Asks its engine for a full refresh from inside the first pass.
struct RequestingProvider {
    inner: StaticSnapshotProvider,
    engine: Mutex<Option<Arc<RefreshEngine>>>,
}

impl WorldSnapshotProvider for RequestingProvider {
    fn node_descriptors(&self) -> Vec<NodeDescriptor> {
        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            engine.request_refresh(true);
        }
        self.inner.node_descriptors()
    }

    fn connections(&self) -> Vec<Connection> {
        self.inner.connections()
    }

    fn effect_sources(&self) -> Vec<EffectSource> {
        self.inner.effect_sources()
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_request_made_during_its_pass_stays_latched() {
    let provider = Arc::new(RequestingProvider {
        inner: StaticSnapshotProvider::with_descriptors(vec![NodeDescriptor::new(
            c(0, 0),
            "MapSwamp",
        )]),
        engine: Mutex::new(None),
    });
    let engine = engine_over(provider.clone());
    *provider.engine.lock() = Some(engine.clone());

    engine.request_refresh(false);
    let served = finish(engine.poll(Utc::now()).unwrap().unwrap()).await;
    assert_eq!(served.mode, RefreshMode::Incremental);
    assert_eq!(served.passes, 1);

    // The request made while that pass ran is still outstanding.
    let now = engine.last_refresh().unwrap();
    assert_eq!(
        engine.evaluate_trigger(now),
        Some(RefreshTrigger::Explicit { full: true })
    );
    let rebuilt = finish(engine.poll(now).unwrap().unwrap()).await;
    assert_eq!(rebuilt.mode, RefreshMode::Full);
    assert!(engine.poll(now).unwrap().is_none());
}

#[tokio::test]
async fn area_change_triggers_full_rebuild() {
    let provider = Arc::new(StaticSnapshotProvider::with_descriptors(vec![
        NodeDescriptor::new(c(0, 0), "MapSwamp"),
        NodeDescriptor::new(c(1, 1), "MapSwamp"),
    ]));
    provider.set_area(Some(AreaId::from(1)));
    let engine = engine_over(provider.clone());

    let first = finish(engine.poll(Utc::now()).unwrap().unwrap()).await;
    assert_eq!(first.created, 2);
    let now = engine.last_refresh().unwrap();
    assert_eq!(engine.evaluate_trigger(now), None);

    provider.set_area(Some(AreaId::from(2)));
    provider.set_descriptors(vec![NodeDescriptor::new(c(40, 40), "MapForest")]);
    assert_eq!(engine.evaluate_trigger(now), Some(RefreshTrigger::AreaChanged));

    let rebuilt = finish(engine.poll(now).unwrap().unwrap()).await;
    assert_eq!(rebuilt.mode, RefreshMode::Full);
    assert_eq!(engine.cache().coordinates(), vec![c(40, 40)]);
    assert_eq!(engine.evaluate_trigger(now), None);
}

#[tokio::test]
async fn growth_and_explicit_requests_trigger_polls() {
    let provider = Arc::new(StaticSnapshotProvider::with_descriptors(vec![
        NodeDescriptor::new(c(0, 0), "MapSwamp"),
    ]));
    let engine = engine_over(provider.clone());
    finish(engine.spawn_refresh(RefreshMode::Incremental).unwrap()).await;
    let now = engine.last_refresh().unwrap();
    assert!(engine.poll(now).unwrap().is_none());

    provider.push_descriptor(NodeDescriptor::new(c(0, 1), "MapSwamp"));
    assert_eq!(engine.evaluate_trigger(now), Some(RefreshTrigger::NodeCountGrew));
    let grown = finish(engine.poll(now).unwrap().unwrap()).await;
    assert_eq!(grown.created, 1);

    engine.request_refresh(false);
    let explicit = finish(engine.poll(now).unwrap().unwrap()).await;
    assert_eq!(explicit.mode, RefreshMode::Incremental);
    // The request was consumed by the poll that served it.
    assert!(engine.poll(now).unwrap().is_none());
}

#[tokio::test]
async fn neighbors_are_symmetric_after_refresh() {
    let mut descriptors = Vec::new();
    let mut connections = Vec::new();
    for x in 0..6 {
        for y in 0..6 {
            descriptors.push(NodeDescriptor::new(c(x, y), "MapSwamp"));
            connections.push(Connection::new(
                c(x, y),
                vec![c(x + 1, y), c(x, y + 1), c(x - 1, y), c(x, y - 1)],
            ));
        }
    }
    // Declared in reverse so many links point at nodes not yet cached.
    descriptors.reverse();
    let provider = Arc::new(StaticSnapshotProvider::with_descriptors(descriptors));
    provider.set_connections(connections);
    let engine = engine_over(provider);

    let report = finish(engine.spawn_refresh(RefreshMode::Incremental).unwrap()).await;
    assert!(report.links_added > 0);

    let cache = engine.cache();
    let nodes = cache.values();
    assert_eq!(nodes.len(), 36);
    for node in &nodes {
        assert!(node.neighbors.len() <= 4);
        assert!(!node.neighbors.contains(&node.coordinates));
        for peer in cache.neighbors_of(node.coordinates) {
            assert!(peer.neighbors.contains(&node.coordinates));
        }
    }
    // Interior nodes end up fully linked, corners with two.
    assert_eq!(cache.get(c(2, 2)).unwrap().neighbors.len(), 4);
    assert_eq!(cache.get(c(0, 0)).unwrap().neighbors.len(), 2);
}
