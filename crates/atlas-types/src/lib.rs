//! Shared type definitions for the Atlas node cache and scoring engine.
//!
//! This crate is the single source of truth for the records exchanged
//! between the world snapshot provider, the type catalog, and the engine.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe keys for catalog tables and opaque world handles
//! - [`coords`] -- Integer grid coordinates and distance helpers
//! - [`catalog`] -- Static map/content/biome/modifier descriptors
//! - [`snapshot`] -- Raw node, connection, and effect-source records

pub mod catalog;
pub mod coords;
pub mod ids;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use catalog::{BiomeType, CatalogTables, Color, ContentType, MapType, ModifierType};
pub use coords::Coordinate;
pub use ids::{AreaId, BiomeId, ContentId, MapTypeId, ModifierId, NodeAddress};
pub use snapshot::{Connection, EffectSource, ModifierPayload, NodeDescriptor};
