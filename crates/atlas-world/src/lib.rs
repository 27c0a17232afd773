//! Node cache and weight scoring for the atlas graph.
//!
//! This crate turns raw node descriptors from a world snapshot into cached,
//! scored [`Node`] records: catalog resolution, tower proximity effects,
//! composite weights, neighbor links, and the outlier-trimmed scale used to
//! rank them.
//!
//! # Modules
//!
//! - [`adjacency`] -- Undirected neighbor index built from the snapshot's
//!   connectivity list, capped at four links per node.
//! - [`cache`] -- [`NodeCache`], the coordinate-keyed arena shared between
//!   the refresh engine and readers.
//! - [`catalog`] -- [`TypeCatalog`] lookup of map types (exact id, alias,
//!   then pattern), content, biomes, and modifiers.
//! - [`effects`] -- Aggregation of in-range tower modifiers into a node's
//!   effect table, with required-content gating.
//! - [`error`] -- Error types for catalog and node operations.
//! - [`node`] -- The derived [`Node`] record and its build/refresh logic.
//! - [`scoring`] -- Composite weight, the visited sentinel, and tower
//!   classification.
//! - [`stats`] -- [`WeightScale`] percentile computation and normalization.

pub mod adjacency;
pub mod cache;
pub mod catalog;
pub mod effects;
pub mod error;
pub mod node;
pub mod scoring;
pub mod stats;

// Re-export primary types at crate root.
pub use adjacency::{AdjacencyIndex, MAX_NEIGHBORS};
pub use cache::{NodeCache, RankedNode, Upserted};
pub use catalog::TypeCatalog;
pub use effects::displayable_effects;
pub use error::{CatalogTable, WorldError};
pub use node::{Effect, Node, NodeContext, NodeRefresh};
pub use scoring::{ScoringSettings, VISITED_WEIGHT, WeightBreakdown, node_weight};
pub use stats::{PercentileSettings, WeightScale};
