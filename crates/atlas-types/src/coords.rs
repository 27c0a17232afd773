//! Integer grid coordinates used as the cache key for every node.

use serde::{Deserialize, Serialize};

/// A position on the atlas grid.
///
/// Ordering is lexicographic on `(x, y)` so coordinate-keyed maps iterate
/// deterministically.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Coordinate {
    /// Horizontal grid position.
    pub x: i32,
    /// Vertical grid position.
    pub y: i32,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Computed in `i64` so it cannot overflow for any pair of `i32`
    /// coordinates.
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x).saturating_sub(i64::from(other.x));
        let dy = i64::from(self.y).saturating_sub(i64::from(other.y));
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance to `other`.
    #[allow(clippy::cast_precision_loss)]
    pub fn distance(self, other: Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// Whether `other` lies within `radius` (inclusive) of this coordinate.
    pub fn within_radius(self, other: Self, radius: u32) -> bool {
        let r = i64::from(radius);
        self.distance_squared(other) <= r.saturating_mul(r)
    }
}

impl core::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}
