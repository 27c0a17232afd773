//! Configuration loading and typed config structures for the Atlas overlay.
//!
//! The configuration is a small YAML document with three sections:
//!
//! ```yaml
//! refresh:
//!   interval_ms: 5000
//!   rebuild_on_area_change: true
//! scoring:
//!   effect_radius: 11
//!   tower_map_ids: [MapLostTowers, MapMesa, MapBluff, MapAlpineRidge, MapSinkingSpire]
//!   self_frozen_tower_ids: [MapLostTowers]
//! percentile:
//!   skip_top: 10
//!   skip_bottom: 5
//!   fallback_min: 0.0
//!   fallback_max: 100.0
//! ```
//!
//! Every field is optional and falls back to the value shown above.

use std::collections::BTreeSet;
use std::path::Path;

use atlas_world::scoring::{
    DEFAULT_EFFECT_RADIUS, DEFAULT_SELF_FROZEN_TOWER_IDS, DEFAULT_TOWER_MAP_IDS,
};
use atlas_world::stats::{
    DEFAULT_FALLBACK_MAX, DEFAULT_FALLBACK_MIN, DEFAULT_SKIP_BOTTOM, DEFAULT_SKIP_TOP,
};
use atlas_world::{PercentileSettings, ScoringSettings};
use serde::Deserialize;

/// Environment variable overriding `refresh.interval_ms`.
pub const REFRESH_INTERVAL_ENV: &str = "ATLAS_REFRESH_INTERVAL_MS";

/// Smallest accepted refresh interval.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AtlasConfig {
    /// Refresh scheduling.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Scoring radius and tower classification.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Percentile scale parameters.
    #[serde(default)]
    pub percentile: PercentileConfig,
}

impl AtlasConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `ATLAS_REFRESH_INTERVAL_MS` overrides `refresh.interval_ms` when set
    /// to a valid integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override values through an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(REFRESH_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.refresh.interval_ms = ms,
                Err(err) => tracing::warn!(
                    variable = REFRESH_INTERVAL_ENV,
                    value = %raw,
                    %err,
                    "Ignoring unparseable override"
                ),
            }
        }
    }

    /// Check every range constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field: "refresh.interval_ms",
                reason: format!(
                    "{} is below the minimum of {MIN_REFRESH_INTERVAL_MS}",
                    self.refresh.interval_ms
                ),
            });
        }
        if self.scoring.effect_radius == 0 {
            return Err(ConfigError::Invalid {
                field: "scoring.effect_radius",
                reason: "must be greater than zero".to_owned(),
            });
        }
        let p = &self.percentile;
        if !p.fallback_min.is_finite() || !p.fallback_max.is_finite() {
            return Err(ConfigError::Invalid {
                field: "percentile.fallback_min",
                reason: "fallbacks must be finite".to_owned(),
            });
        }
        if p.fallback_min > p.fallback_max {
            return Err(ConfigError::Invalid {
                field: "percentile.fallback_min",
                reason: format!(
                    "{} exceeds fallback_max {}",
                    p.fallback_min, p.fallback_max
                ),
            });
        }
        Ok(())
    }
}

/// Refresh scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshConfig {
    /// Minimum milliseconds between interval-triggered refreshes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Clear the cache when the provider reports a new area.
    #[serde(default = "default_rebuild_on_area_change")]
    pub rebuild_on_area_change: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            rebuild_on_area_change: default_rebuild_on_area_change(),
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScoringConfig {
    /// Inclusive tower proximity radius in grid units.
    #[serde(default = "default_effect_radius")]
    pub effect_radius: u32,

    /// Map ids classified as towers.
    #[serde(default = "default_tower_map_ids")]
    pub tower_map_ids: BTreeSet<String>,

    /// Tower ids whose own broadcast freezes once visited.
    #[serde(default = "default_self_frozen_tower_ids")]
    pub self_frozen_tower_ids: BTreeSet<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            effect_radius: default_effect_radius(),
            tower_map_ids: default_tower_map_ids(),
            self_frozen_tower_ids: default_self_frozen_tower_ids(),
        }
    }
}

impl From<&ScoringConfig> for ScoringSettings {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            effect_radius: config.effect_radius,
            tower_map_ids: config.tower_map_ids.clone(),
            self_frozen_tower_ids: config.self_frozen_tower_ids.clone(),
        }
    }
}

/// Percentile scale configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PercentileConfig {
    /// Weights skipped from the top.
    #[serde(default = "default_skip_top")]
    pub skip_top: usize,

    /// Weights skipped from the bottom.
    #[serde(default = "default_skip_bottom")]
    pub skip_bottom: usize,

    /// `min_weight` for an empty population.
    #[serde(default = "default_fallback_min")]
    pub fallback_min: f64,

    /// `max_weight` for an empty population.
    #[serde(default = "default_fallback_max")]
    pub fallback_max: f64,
}

impl Default for PercentileConfig {
    fn default() -> Self {
        Self {
            skip_top: default_skip_top(),
            skip_bottom: default_skip_bottom(),
            fallback_min: default_fallback_min(),
            fallback_max: default_fallback_max(),
        }
    }
}

impl From<&PercentileConfig> for PercentileSettings {
    fn from(config: &PercentileConfig) -> Self {
        Self {
            skip_top: config.skip_top,
            skip_bottom: config.skip_bottom,
            fallback_min: config.fallback_min,
            fallback_max: config.fallback_max,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_interval_ms() -> u64 {
    5_000
}

const fn default_rebuild_on_area_change() -> bool {
    true
}

const fn default_effect_radius() -> u32 {
    DEFAULT_EFFECT_RADIUS
}

fn default_tower_map_ids() -> BTreeSet<String> {
    DEFAULT_TOWER_MAP_IDS.iter().map(|s| (*s).to_owned()).collect()
}

fn default_self_frozen_tower_ids() -> BTreeSet<String> {
    DEFAULT_SELF_FROZEN_TOWER_IDS
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

const fn default_skip_top() -> usize {
    DEFAULT_SKIP_TOP
}

const fn default_skip_bottom() -> usize {
    DEFAULT_SKIP_BOTTOM
}

const fn default_fallback_min() -> f64 {
    DEFAULT_FALLBACK_MIN
}

const fn default_fallback_max() -> f64 {
    DEFAULT_FALLBACK_MAX
}
