//! Configuration, snapshot polling, and background refresh for the Atlas
//! overlay.
//!
//! This crate wires the scoring model in `atlas-world` to a live world: it
//! loads the overlay configuration, polls a [`WorldSnapshotProvider`], and
//! keeps a shared [`NodeCache`] current from a tokio blocking task.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration ([`AtlasConfig`]) with defaults,
//!   validation, and environment overrides.
//! - [`provider`] -- The [`WorldSnapshotProvider`] trait and the in-memory
//!   [`StaticSnapshotProvider`].
//! - [`refresh`] -- [`RefreshEngine`]: guarded, coalescing refresh passes
//!   and their [`RefreshReport`].
//! - [`trigger`] -- When a refresh is due, and in which [`RefreshMode`].
//!
//! [`NodeCache`]: atlas_world::NodeCache

pub mod config;
pub mod provider;
pub mod refresh;
pub mod trigger;

pub use config::{AtlasConfig, ConfigError};
pub use provider::{StaticSnapshotProvider, WorldSnapshotProvider};
pub use refresh::{RefreshEngine, RefreshError, RefreshReport, RefreshTicket};
pub use trigger::{RefreshMode, RefreshTrigger};
