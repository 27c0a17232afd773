//! The type catalog: read-only lookup tables for map types, content, biomes,
//! and modifiers.
//!
//! Map types are found by exact identifier first (the canonical id or any of
//! the extra `identifiers`), then by the first regular expression in
//! `patterns` that matches the raw id. Patterns are compiled once on insert,
//! so a bad pattern is reported up front rather than on every lookup.

use std::collections::BTreeMap;

use atlas_types::{
    BiomeId, BiomeType, CatalogTables, ContentId, ContentType, MapType, MapTypeId, ModifierId,
    ModifierType,
};
use regex::Regex;

use crate::error::{CatalogTable, WorldError};

/// Immutable-after-construction lookup tables consumed by the scoring engine.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    /// Map types indexed by canonical id.
    map_types: BTreeMap<MapTypeId, MapType>,
    /// Exact raw identifier -> canonical map type id.
    identifiers: BTreeMap<String, MapTypeId>,
    /// Compiled fallback patterns in insertion order.
    patterns: Vec<(Regex, MapTypeId)>,
    /// Content types indexed by name.
    content: BTreeMap<ContentId, ContentType>,
    /// Biome types indexed by id.
    biomes: BTreeMap<BiomeId, BiomeType>,
    /// Modifier types indexed by id.
    modifiers: BTreeMap<ModifierId, ModifierType>,
}

impl TypeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the raw tables handed over by the loading glue.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPattern`] if a map type pattern does not
    /// compile, or [`WorldError::DuplicateEntry`] if an id appears twice in
    /// the same table.
    pub fn from_tables(tables: CatalogTables) -> Result<Self, WorldError> {
        let mut catalog = Self::new();
        for map_type in tables.map_types {
            catalog.insert_map_type(map_type)?;
        }
        for content in tables.content {
            catalog.insert_content(content)?;
        }
        for biome in tables.biomes {
            catalog.insert_biome(biome)?;
        }
        for modifier in tables.modifiers {
            catalog.insert_modifier(modifier)?;
        }
        Ok(catalog)
    }

    // -------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------

    /// Add a map type, registering its identifiers and compiling its
    /// patterns.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateEntry`] if the id is already present
    /// or [`WorldError::InvalidPattern`] if a pattern does not compile.
    pub fn insert_map_type(&mut self, map_type: MapType) -> Result<(), WorldError> {
        if self.map_types.contains_key(&map_type.id) {
            return Err(WorldError::DuplicateEntry {
                table: CatalogTable::MapType,
                id: map_type.id.to_string(),
            });
        }

        let mut compiled = Vec::with_capacity(map_type.patterns.len());
        for pattern in &map_type.patterns {
            let regex = Regex::new(pattern).map_err(|source| WorldError::InvalidPattern {
                map_type: map_type.id.to_string(),
                pattern: pattern.clone(),
                source,
            })?;
            compiled.push((regex, map_type.id.clone()));
        }
        self.patterns.extend(compiled);

        self.identifiers
            .insert(map_type.id.to_string(), map_type.id.clone());
        for raw in &map_type.identifiers {
            self.identifiers
                .entry(raw.clone())
                .or_insert_with(|| map_type.id.clone());
        }
        self.map_types.insert(map_type.id.clone(), map_type);
        Ok(())
    }

    /// Add a content type.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateEntry`] if the id is already present.
    pub fn insert_content(&mut self, content: ContentType) -> Result<(), WorldError> {
        insert_unique(&mut self.content, content.id.clone(), content, CatalogTable::Content)
    }

    /// Add a biome type.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateEntry`] if the id is already present.
    pub fn insert_biome(&mut self, biome: BiomeType) -> Result<(), WorldError> {
        insert_unique(&mut self.biomes, biome.id.clone(), biome, CatalogTable::Biome)
    }

    /// Add a modifier type.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateEntry`] if the id is already present.
    pub fn insert_modifier(&mut self, modifier: ModifierType) -> Result<(), WorldError> {
        insert_unique(
            &mut self.modifiers,
            modifier.id.clone(),
            modifier,
            CatalogTable::Modifier,
        )
    }

    // -------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------

    /// Resolve a raw map identifier: exact identifier first, then patterns.
    pub fn map_type(&self, raw_id: &str) -> Option<&MapType> {
        if let Some(id) = self.identifiers.get(raw_id) {
            return self.map_types.get(id);
        }
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(raw_id))
            .and_then(|(_, id)| self.map_types.get(id))
    }

    /// Look up a content type by name.
    pub fn content(&self, id: &str) -> Option<&ContentType> {
        self.content.get(id)
    }

    /// Look up a biome type.
    pub fn biome(&self, id: &str) -> Option<&BiomeType> {
        self.biomes.get(id)
    }

    /// Look up a modifier type.
    pub fn modifier(&self, id: &str) -> Option<&ModifierType> {
        self.modifiers.get(id)
    }

    /// Iterate over all map types.
    pub fn map_types(&self) -> impl Iterator<Item = &MapType> {
        self.map_types.values()
    }

    /// Iterate over all modifier types.
    pub fn modifiers(&self) -> impl Iterator<Item = &ModifierType> {
        self.modifiers.values()
    }

    /// Total number of entries across all four tables.
    pub fn len(&self) -> usize {
        self.map_types
            .len()
            .saturating_add(self.content.len())
            .saturating_add(self.biomes.len())
            .saturating_add(self.modifiers.len())
    }

    /// Whether every table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_unique<K: Ord + core::fmt::Display, V>(
    table: &mut BTreeMap<K, V>,
    key: K,
    value: V,
    kind: CatalogTable,
) -> Result<(), WorldError> {
    if table.contains_key(&key) {
        return Err(WorldError::DuplicateEntry {
            table: kind,
            id: key.to_string(),
        });
    }
    table.insert(key, value);
    Ok(())
}
