//! Outlier-trimmed weight scale used to rank and color nodes.
//!
//! The scale's bounds are not the true extremes: `max_weight` is the value
//! `skip_top` places below the highest weight and `min_weight` the value
//! `skip_bottom` places above the lowest, so a single extreme node cannot
//! stretch the scale. Visited nodes are excluded by the caller.

use serde::Serialize;

/// Default number of top weights skipped.
pub const DEFAULT_SKIP_TOP: usize = 10;

/// Default number of bottom weights skipped.
pub const DEFAULT_SKIP_BOTTOM: usize = 5;

/// Default `min_weight` for an empty population.
pub const DEFAULT_FALLBACK_MIN: f64 = 0.0;

/// Default `max_weight` for an empty population.
pub const DEFAULT_FALLBACK_MAX: f64 = 100.0;

/// Skip counts and fallbacks for the percentile computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileSettings {
    /// Weights skipped from the top before taking `max_weight`.
    pub skip_top: usize,
    /// Weights skipped from the bottom before taking `min_weight`.
    pub skip_bottom: usize,
    /// `min_weight` when no weights are available.
    pub fallback_min: f64,
    /// `max_weight` when no weights are available.
    pub fallback_max: f64,
}

impl Default for PercentileSettings {
    fn default() -> Self {
        Self {
            skip_top: DEFAULT_SKIP_TOP,
            skip_bottom: DEFAULT_SKIP_BOTTOM,
            fallback_min: DEFAULT_FALLBACK_MIN,
            fallback_max: DEFAULT_FALLBACK_MAX,
        }
    }
}

/// The two process-wide scalars consumed by ranking and coloring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightScale {
    /// Lower bound of the scale.
    pub min_weight: f64,
    /// Upper bound of the scale.
    pub max_weight: f64,
}

impl WeightScale {
    /// The fallback scale for an empty population.
    pub const fn fallback(settings: &PercentileSettings) -> Self {
        Self {
            min_weight: settings.fallback_min,
            max_weight: settings.fallback_max,
        }
    }

    /// Compute the trimmed scale over `weights`.
    ///
    /// Non-finite weights are ignored. When the population is too small for
    /// the trimmed ranks to stay ordered, the true extremes are used so that
    /// `min_weight <= max_weight` always holds.
    pub fn compute(weights: impl IntoIterator<Item = f64>, settings: &PercentileSettings) -> Self {
        let mut sorted: Vec<f64> = weights.into_iter().filter(|w| w.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let last = sorted.len().saturating_sub(1);
        let trimmed_max = sorted.get(last.saturating_sub(settings.skip_top));
        let trimmed_min = sorted.get(settings.skip_bottom.min(last));

        match (trimmed_min, trimmed_max, sorted.first(), sorted.last()) {
            (Some(&min), Some(&max), _, _) if min <= max => Self {
                min_weight: min,
                max_weight: max,
            },
            (_, _, Some(&lowest), Some(&highest)) => Self {
                min_weight: lowest,
                max_weight: highest,
            },
            _ => Self::fallback(settings),
        }
    }

    /// Scale `weight` into `[0, 1]`.
    ///
    /// A degenerate scale (`max_weight == min_weight`) maps weights at the
    /// bound to `0.5`, above it to `1.0`, and below it to `0.0`.
    pub fn normalize(&self, weight: f64) -> f64 {
        let range = self.max_weight - self.min_weight;
        if range <= f64::EPSILON {
            return if weight > self.max_weight {
                1.0
            } else if weight < self.min_weight {
                0.0
            } else {
                0.5
            };
        }
        ((weight - self.min_weight) / range).clamp(0.0, 1.0)
    }
}

impl Default for WeightScale {
    fn default() -> Self {
        Self::fallback(&PercentileSettings::default())
    }
}
