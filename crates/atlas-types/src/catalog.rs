//! Static catalog descriptors: map types, content, biomes, and modifiers.
//!
//! These are the read-only lookup records the scoring engine consumes. They
//! are produced by external glue (settings files, game data dumps) and handed
//! over as [`CatalogTables`]; nothing in this crate reads files.

use serde::{Deserialize, Serialize};

use crate::ids::{BiomeId, ContentId, MapTypeId, ModifierId};

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// RGBA display color attached to catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque white, the display color of placeholder entries.
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    /// Create a color from its four channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

// ---------------------------------------------------------------------------
// MapType
// ---------------------------------------------------------------------------

/// Descriptor of a location category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapType {
    /// Canonical catalog key.
    pub id: MapTypeId,
    /// Display name.
    pub name: String,
    /// Additional raw identifiers this map type matches exactly.
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Regular expressions tried against a raw identifier when no exact
    /// key matches.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Base weight contributed to every node of this type.
    #[serde(default)]
    pub weight: f64,
    /// Biomes every node of this type inherits.
    #[serde(default)]
    pub biomes: Vec<BiomeId>,
    /// Whether the overlay highlights nodes of this type.
    #[serde(default)]
    pub highlight: bool,
    /// Whether the overlay draws a line to nodes of this type.
    #[serde(default)]
    pub draw_line: bool,
    /// Display color.
    #[serde(default)]
    pub color: Color,
}

impl MapType {
    /// Zero-weight stand-in for a raw id missing from the catalog.
    pub fn placeholder(raw_id: &str) -> Self {
        Self {
            id: MapTypeId::new(raw_id),
            name: raw_id.to_owned(),
            identifiers: Vec::new(),
            patterns: Vec::new(),
            weight: 0.0,
            biomes: Vec::new(),
            highlight: false,
            draw_line: false,
            color: Color::WHITE,
        }
    }
}

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

/// Descriptor of a discrete feature present on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    /// Catalog key, also the content name reported by the snapshot.
    pub id: ContentId,
    /// Display name.
    pub name: String,
    /// Weight contributed when present on a node.
    #[serde(default)]
    pub weight: f64,
    /// Display color.
    #[serde(default)]
    pub color: Color,
    /// Whether the overlay highlights nodes carrying this content.
    #[serde(default)]
    pub highlight: bool,
}

impl ContentType {
    /// Zero-weight stand-in for a content name missing from the catalog.
    pub fn placeholder(id: &ContentId) -> Self {
        Self {
            id: id.clone(),
            name: id.to_string(),
            weight: 0.0,
            color: Color::WHITE,
            highlight: false,
        }
    }
}

// ---------------------------------------------------------------------------
// BiomeType
// ---------------------------------------------------------------------------

/// Descriptor of an environmental tag inherited from a map type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeType {
    /// Catalog key.
    pub id: BiomeId,
    /// Display name.
    pub name: String,
    /// Weight contributed by this biome.
    #[serde(default)]
    pub weight: f64,
    /// Display color.
    #[serde(default)]
    pub color: Color,
    /// Whether the overlay highlights nodes in this biome.
    #[serde(default)]
    pub highlight: bool,
}

impl BiomeType {
    /// Zero-weight stand-in for a biome missing from the catalog.
    pub fn placeholder(id: &BiomeId) -> Self {
        Self {
            id: id.clone(),
            name: id.to_string(),
            weight: 0.0,
            color: Color::WHITE,
            highlight: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ModifierType
// ---------------------------------------------------------------------------

/// Descriptor of a passive modifier broadcast by towers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierType {
    /// Catalog key.
    pub id: ModifierId,
    /// Display name.
    pub name: String,
    /// Long-form description shown next to the name.
    #[serde(default)]
    pub description: String,
    /// Weight per unit of magnitude.
    #[serde(default)]
    pub weight: f64,
    /// Display color.
    #[serde(default)]
    pub color: Color,
    /// Whether the overlay highlights nodes carrying this modifier.
    #[serde(default)]
    pub highlight: bool,
    /// Content name the modifier is gated on. `None` means ungated.
    #[serde(default)]
    pub required_content: Option<String>,
    /// Minimum accumulated magnitude before the overlay shows the modifier.
    #[serde(default)]
    pub min_value_to_show: f64,
    /// Whether the modifier is shown on the map at all.
    #[serde(default = "default_true")]
    pub show_on_map: bool,
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// CatalogTables
// ---------------------------------------------------------------------------

/// The four raw catalog tables, as handed over by the loading glue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTables {
    /// Map type records.
    #[serde(default)]
    pub map_types: Vec<MapType>,
    /// Content records.
    #[serde(default)]
    pub content: Vec<ContentType>,
    /// Biome records.
    #[serde(default)]
    pub biomes: Vec<BiomeType>,
    /// Modifier records.
    #[serde(default)]
    pub modifiers: Vec<ModifierType>,
}
