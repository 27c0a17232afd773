//! The background refresh engine.
//!
//! [`RefreshEngine`] owns the `Idle -> Refreshing -> Idle` cycle over a
//! shared [`NodeCache`]. A pass reads one snapshot from the provider,
//! creates or refreshes every described node, links it into the adjacency
//! graph, and finally recomputes the weight scale.
//!
//! # Guard and coalescing
//!
//! At most one pass runs at a time. A caller first records its request in
//! the `pending` flag and then tries to take the `refreshing` guard. If the
//! guard is held, the running pass sees the pending flag before it goes idle
//! and runs one more pass, so a request made mid-refresh is never lost and
//! any number of them collapse into a single extra pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use atlas_types::{AreaId, Coordinate, NodeDescriptor};
use atlas_world::{
    AdjacencyIndex, NodeCache, NodeContext, NodeRefresh, PercentileSettings, ScoringSettings,
    TypeCatalog, WeightScale, WorldError,
};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AtlasConfig;
use crate::provider::WorldSnapshotProvider;
use crate::trigger::{self, RefreshMode, RefreshTrigger, TriggerInputs};

/// Errors raised when starting a refresh.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// `spawn_refresh` was called outside a tokio runtime.
    #[error("no tokio runtime to run the refresh on: {source}")]
    NoRuntime {
        /// The underlying runtime lookup error.
        #[from]
        source: tokio::runtime::TryCurrentError,
    },
}

/// Summary of one refresh run.
///
/// When requests were coalesced into the run, the counters are summed over
/// every pass and `scale` is the one computed by the last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    /// `Full` if any pass in the run cleared the cache.
    pub mode: RefreshMode,
    /// Nodes inserted.
    pub created: usize,
    /// Nodes rescored or newly marked visited.
    pub refreshed: usize,
    /// Nodes left as they were (visited, or inserted concurrently).
    pub unchanged: usize,
    /// Descriptors skipped because of an error.
    pub failed: usize,
    /// Neighbor links added.
    pub links_added: usize,
    /// Weight scale after the last pass.
    pub scale: WeightScale,
    /// Number of passes in this run.
    pub passes: u32,
    /// When the first pass started.
    pub started_at: DateTime<Utc>,
    /// When the last pass finished.
    pub finished_at: DateTime<Utc>,
}

impl RefreshReport {
    fn empty(mode: RefreshMode, scale: WeightScale) -> Self {
        let now = Utc::now();
        Self {
            mode,
            created: 0,
            refreshed: 0,
            unchanged: 0,
            failed: 0,
            links_added: 0,
            scale,
            passes: 0,
            started_at: now,
            finished_at: now,
        }
    }

    fn absorb(&mut self, pass: Self) {
        if self.passes == 0 {
            self.started_at = pass.started_at;
            self.mode = pass.mode;
        } else if pass.mode == RefreshMode::Full {
            self.mode = RefreshMode::Full;
        }
        self.created = self.created.saturating_add(pass.created);
        self.refreshed = self.refreshed.saturating_add(pass.refreshed);
        self.unchanged = self.unchanged.saturating_add(pass.unchanged);
        self.failed = self.failed.saturating_add(pass.failed);
        self.links_added = self.links_added.saturating_add(pass.links_added);
        self.scale = pass.scale;
        self.passes = self.passes.saturating_add(pass.passes);
        self.finished_at = pass.finished_at;
    }
}

/// Outcome of asking for a background refresh.
#[derive(Debug)]
pub enum RefreshTicket {
    /// A new run was started; the handle yields its report.
    Started(JoinHandle<RefreshReport>),
    /// A run was already in progress and will pick this request up.
    Coalesced,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    last_refresh: Option<DateTime<Utc>>,
    last_world_nodes: usize,
    last_area: Option<AreaId>,
    last_report: Option<RefreshReport>,
}

/// Drives refresh passes of a [`NodeCache`] from a snapshot provider.
pub struct RefreshEngine {
    cache: Arc<NodeCache>,
    provider: Arc<dyn WorldSnapshotProvider>,
    catalog: Arc<TypeCatalog>,
    scoring: ScoringSettings,
    percentile: PercentileSettings,
    interval: TimeDelta,
    rebuild_on_area_change: bool,

    /// Held while a run is in progress.
    refreshing: AtomicBool,
    /// A pass has been requested and not yet started.
    pending: AtomicBool,
    /// Some pending request asked for a full rebuild.
    pending_full: AtomicBool,
    /// Latched by `request_refresh` until the next poll consumes it.
    explicit: AtomicBool,
    explicit_full: AtomicBool,

    book: Mutex<Bookkeeping>,
}

impl std::fmt::Debug for RefreshEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshEngine")
            .field("cached_nodes", &self.cache.len())
            .field("refreshing", &self.is_refreshing())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl RefreshEngine {
    /// Create an engine over the given cache, provider, and catalog.
    pub fn new(
        cache: Arc<NodeCache>,
        provider: Arc<dyn WorldSnapshotProvider>,
        catalog: Arc<TypeCatalog>,
        config: &AtlasConfig,
    ) -> Self {
        let interval = i64::try_from(config.refresh.interval_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            cache,
            provider,
            catalog,
            scoring: ScoringSettings::from(&config.scoring),
            percentile: PercentileSettings::from(&config.percentile),
            interval,
            rebuild_on_area_change: config.refresh.rebuild_on_area_change,
            refreshing: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            pending_full: AtomicBool::new(false),
            explicit: AtomicBool::new(false),
            explicit_full: AtomicBool::new(false),
            book: Mutex::new(Bookkeeping::default()),
        }
    }

    /// The cache this engine writes to.
    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    /// Whether a run is in progress.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Completion time of the last pass.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.book.lock().last_refresh
    }

    /// Report of the last completed run.
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.book.lock().last_report.clone()
    }

    // -------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------

    /// Ask for a refresh on the next [`poll`](Self::poll).
    pub fn request_refresh(&self, full: bool) {
        if full {
            self.explicit_full.store(true, Ordering::SeqCst);
        }
        self.explicit.store(true, Ordering::SeqCst);
    }

    /// Return the first trigger that holds at `now`, without consuming it.
    pub fn evaluate_trigger(&self, now: DateTime<Utc>) -> Option<RefreshTrigger> {
        let (last_refresh, last_world_nodes, last_area) = {
            let book = self.book.lock();
            (book.last_refresh, book.last_world_nodes, book.last_area)
        };
        let explicit = self
            .explicit
            .load(Ordering::SeqCst)
            .then(|| self.explicit_full.load(Ordering::SeqCst));
        let inputs = TriggerInputs {
            explicit,
            area_changed: last_refresh.is_some() && self.provider.current_area() != last_area,
            cached_nodes: self.cache.len(),
            world_nodes: self.provider.node_count(),
            last_world_nodes,
            last_refresh,
            interval: self.interval,
        };
        trigger::evaluate(&inputs, now)
    }

    /// Evaluate the triggers and start a background refresh if one fires.
    ///
    /// Does nothing while a run is in progress; an outstanding explicit
    /// request stays latched until the run is over. An explicit request is
    /// consumed before the run is spawned, so one made while that run is
    /// going stays latched for the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::NoRuntime`] outside a tokio runtime. The
    /// request that fired is left outstanding.
    pub fn poll(
        self: &Arc<Self>,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTicket>, RefreshError> {
        if self.is_refreshing() {
            return Ok(None);
        }
        let Some(mut fired) = self.evaluate_trigger(now) else {
            return Ok(None);
        };
        let runtime = tokio::runtime::Handle::try_current()?;
        if let RefreshTrigger::Explicit { full } = fired {
            // `request_refresh` sets the full flag first, so clearing the
            // latch first never strands a full request behind it.
            self.explicit.store(false, Ordering::SeqCst);
            let full = self.explicit_full.swap(false, Ordering::SeqCst) || full;
            fired = RefreshTrigger::Explicit { full };
        }
        let mode = fired.mode(self.rebuild_on_area_change);
        debug!(trigger = ?fired, ?mode, "Refresh triggered");
        Ok(Some(self.spawn_on(&runtime, mode)))
    }

    // -------------------------------------------------------------------
    // Running passes
    // -------------------------------------------------------------------

    /// Start a run on tokio's blocking pool.
    ///
    /// If a run is already in progress the request is coalesced into it.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::NoRuntime`] outside a tokio runtime.
    pub fn spawn_refresh(self: &Arc<Self>, mode: RefreshMode) -> Result<RefreshTicket, RefreshError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        Ok(self.spawn_on(&runtime, mode))
    }

    fn spawn_on(self: &Arc<Self>, runtime: &tokio::runtime::Handle, mode: RefreshMode) -> RefreshTicket {
        if !self.enqueue(mode) {
            return RefreshTicket::Coalesced;
        }
        let engine = Arc::clone(self);
        RefreshTicket::Started(runtime.spawn_blocking(move || engine.drive()))
    }

    /// Run on the calling thread until no request is pending.
    ///
    /// Returns `None` if another run was in progress; that run performs the
    /// requested pass instead.
    pub fn refresh_blocking(&self, mode: RefreshMode) -> Option<RefreshReport> {
        self.enqueue(mode).then(|| self.drive())
    }

    /// Record a request and try to take the guard. Returns whether the
    /// caller now holds it.
    fn enqueue(&self, mode: RefreshMode) -> bool {
        if mode == RefreshMode::Full {
            self.pending_full.store(true, Ordering::SeqCst);
        }
        self.pending.store(true, Ordering::SeqCst);
        let acquired = self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !acquired {
            debug!(?mode, "Refresh in progress, request coalesced");
        }
        acquired
    }

    /// Run passes while requests are pending. Must hold the guard.
    fn drive(&self) -> RefreshReport {
        let mut report = RefreshReport::empty(RefreshMode::Incremental, self.cache.scale());
        loop {
            if self.pending.swap(false, Ordering::SeqCst) {
                let mode = if self.pending_full.swap(false, Ordering::SeqCst) {
                    RefreshMode::Full
                } else {
                    RefreshMode::Incremental
                };
                report.absorb(self.run_pass(mode));
                continue;
            }

            self.refreshing.store(false, Ordering::SeqCst);
            // A request may have landed between the swap above and the
            // release; its owner failed to take the guard, so pick it up.
            let reacquired = self.pending.load(Ordering::SeqCst)
                && self
                    .refreshing
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
            if !reacquired {
                break;
            }
        }

        self.book.lock().last_report = Some(report.clone());
        report
    }

    fn run_pass(&self, mode: RefreshMode) -> RefreshReport {
        let started_at = Utc::now();
        if mode == RefreshMode::Full {
            self.cache.clear();
        }

        let area = self.provider.current_area();
        let descriptors = self.provider.node_descriptors();
        let sources = self.provider.effect_sources();
        let index = AdjacencyIndex::from_connections(&self.provider.connections());
        let ctx = NodeContext {
            catalog: &self.catalog,
            sources: &sources,
            settings: &self.scoring,
        };

        let mut pass = RefreshReport::empty(mode, self.cache.scale());
        pass.started_at = started_at;
        pass.passes = 1;

        for descriptor in &descriptors {
            match self.apply(descriptor, &ctx) {
                Ok((at, outcome)) => {
                    match outcome {
                        Applied::Created => pass.created = pass.created.saturating_add(1),
                        Applied::Refreshed => pass.refreshed = pass.refreshed.saturating_add(1),
                        Applied::Unchanged => pass.unchanged = pass.unchanged.saturating_add(1),
                    }
                    let linked = self.cache.link_neighbors(at, &index);
                    pass.links_added = pass.links_added.saturating_add(linked);
                }
                Err(err) => {
                    warn!(coord = ?descriptor.coordinates, %err, "Skipping node");
                    pass.failed = pass.failed.saturating_add(1);
                }
            }
        }

        pass.scale = self.cache.recompute_scale(&self.percentile);
        pass.finished_at = Utc::now();
        {
            let mut book = self.book.lock();
            book.last_refresh = Some(pass.finished_at);
            book.last_world_nodes = descriptors.len();
            book.last_area = area;
        }

        info!(
            ?mode,
            created = pass.created,
            refreshed = pass.refreshed,
            unchanged = pass.unchanged,
            failed = pass.failed,
            links_added = pass.links_added,
            min_weight = pass.scale.min_weight,
            max_weight = pass.scale.max_weight,
            duration_ms = pass
                .finished_at
                .signed_duration_since(started_at)
                .num_milliseconds(),
            "Refresh pass complete"
        );
        pass
    }

    /// Create or refresh the node for one descriptor.
    fn apply(
        &self,
        descriptor: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<(Coordinate, Applied), WorldError> {
        if let Some(at) = descriptor.coordinates
            && self.cache.contains(at)
        {
            match self.cache.refresh_existing(at, descriptor, ctx) {
                Ok(NodeRefresh::Unchanged) => return Ok((at, Applied::Unchanged)),
                Ok(outcome) => {
                    debug!(coord = %at, ?outcome, "Node refreshed");
                    return Ok((at, Applied::Refreshed));
                }
                // Cleared from under us; fall through and insert.
                Err(WorldError::NodeNotCached(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let upserted = self.cache.upsert_new(descriptor, ctx)?;
        let at = upserted.node.coordinates;
        if upserted.inserted {
            debug!(coord = %at, map = upserted.node.name(), weight = upserted.node.weight, "Node created");
            Ok((at, Applied::Created))
        } else {
            Ok((at, Applied::Unchanged))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Applied {
    Created,
    Refreshed,
    Unchanged,
}
