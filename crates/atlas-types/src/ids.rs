//! Type-safe identifier wrappers.
//!
//! Catalog entries are keyed by human-readable string identifiers (the raw
//! ids the game data uses, e.g. `"MapLostTowers"` or `"Breach"`). Each table
//! gets its own newtype so a content id can never be used to look up a
//! modifier. Opaque numeric handles coming from the world snapshot
//! (node addresses, area hashes) get their own wrappers as well.

use core::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates a newtype wrapper around an opaque `u64` handle.
macro_rules! define_handle {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the raw handle value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_key! {
    /// Canonical key of a map type in the catalog.
    MapTypeId
}

define_key! {
    /// Key of a content type (e.g. `"Breach"`, `"Boss"`).
    ContentId
}

define_key! {
    /// Key of a biome type.
    BiomeId
}

define_key! {
    /// Key of a modifier type broadcast by towers.
    ModifierId
}

define_handle! {
    /// Opaque correlation id of a node in the external world data.
    NodeAddress
}

define_handle! {
    /// Identity of the world area the snapshot was taken in.
    ///
    /// A change of area invalidates every cached node.
    AreaId
}
