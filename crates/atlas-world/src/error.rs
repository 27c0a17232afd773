//! Error types for the `atlas-world` crate.
//!
//! None of these are fatal to a refresh: the engine logs them per node and
//! moves on. They exist so callers can tell a malformed upstream record from
//! a catalog problem.

use atlas_types::Coordinate;

/// Which catalog table a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    /// Map types.
    MapType,
    /// Content types.
    Content,
    /// Biome types.
    Biome,
    /// Modifier types.
    Modifier,
}

impl core::fmt::Display for CatalogTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::MapType => "map type",
            Self::Content => "content",
            Self::Biome => "biome",
            Self::Modifier => "modifier",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building or refreshing cached nodes.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A descriptor referenced an id absent from the catalog.
    #[error("missing {table} catalog entry: {id}")]
    MissingCatalogEntry {
        /// The table that was searched.
        table: CatalogTable,
        /// The id that was not found.
        id: String,
    },

    /// A snapshot record could not be interpreted.
    #[error("malformed descriptor: {reason}")]
    MalformedDescriptor {
        /// Explanation of what is wrong with the record.
        reason: String,
    },

    /// A map type carried a pattern that is not a valid regular expression.
    #[error("invalid pattern {pattern:?} on map type {map_type}: {source}")]
    InvalidPattern {
        /// The map type carrying the pattern.
        map_type: String,
        /// The offending pattern.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// A catalog id was inserted twice.
    #[error("duplicate {table} catalog entry: {id}")]
    DuplicateEntry {
        /// The table the duplicate was inserted into.
        table: CatalogTable,
        /// The duplicated id.
        id: String,
    },

    /// A refresh targeted a coordinate that is no longer cached.
    #[error("node not cached: {0}")]
    NodeNotCached(Coordinate),
}
