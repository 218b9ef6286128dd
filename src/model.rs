//! Data models for the grid inventory.
//!
//! This module defines the value types external collaborators hand to the engine:
//! - `ItemDescriptor`: an item type with its key, footprint and per-unit weight
//! - `GridDimensions`: width, height and raw per-cell capacity of the grid
//! - `KeyId` / `KeyTable`: interned item keys, so cells and the group index
//!   compare integers instead of strings

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Dimensional, Footprint, Weighted, validation};

/// Validation error for descriptor and grid data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid footprint: {0}")]
    InvalidFootprint(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid item key: {0}")]
    InvalidKey(String),
    #[error("Invalid grid dimensions: {0}")]
    InvalidGrid(String),
}

fn default_weight() -> u32 {
    1
}

/// Describes one item type that can be stored in the grid.
///
/// Implements the `Dimensional` and `Weighted` traits.
///
/// # Fields
/// * `key` - Stable identifier of the item type, used for stacking
/// * `size` - Footprint in cells (width, height)
/// * `weight` - Per-unit weight; a cell holds `capacity / weight` units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub key: String,
    pub size: Footprint,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl ItemDescriptor {
    /// Creates a new descriptor with validation.
    ///
    /// # Examples
    /// ```
    /// use grid_inventory::model::ItemDescriptor;
    ///
    /// assert!(ItemDescriptor::new("ore", (2, 1), 1).is_ok());
    /// assert!(ItemDescriptor::new("ore", (0, 1), 1).is_err());
    /// assert!(ItemDescriptor::new("", (1, 1), 1).is_err());
    /// ```
    pub fn new(
        key: impl Into<String>,
        size: impl Into<Footprint>,
        weight: u32,
    ) -> Result<Self, ValidationError> {
        let descriptor = Self {
            key: key.into(),
            size: size.into(),
            weight,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Checks the invariants `new` enforces; deserialized descriptors go through here too.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key.trim().is_empty() {
            return Err(ValidationError::InvalidKey(
                "Item key must not be empty".to_string(),
            ));
        }
        validation::validate_footprint(self.size).map_err(ValidationError::InvalidFootprint)?;
        validation::validate_weight(self.weight).map_err(ValidationError::InvalidWeight)?;
        Ok(())
    }
}

impl Dimensional for ItemDescriptor {
    fn footprint(&self) -> Footprint {
        self.size
    }
}

impl Weighted for ItemDescriptor {
    fn weight(&self) -> u32 {
        self.weight
    }
}

/// Fixed extent and uniform raw per-cell capacity of a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDimensions {
    pub width: usize,
    pub height: usize,
    pub cell_capacity: u32,
}

impl GridDimensions {
    pub const DEFAULT_WIDTH: usize = 10;
    pub const DEFAULT_HEIGHT: usize = 10;
    pub const DEFAULT_CELL_CAPACITY: u32 = 1;

    /// Creates grid dimensions after validating that every value is positive.
    pub fn new(width: usize, height: usize, cell_capacity: u32) -> Result<Self, ValidationError> {
        validation::validate_extent(width, "Grid width").map_err(ValidationError::InvalidGrid)?;
        validation::validate_extent(height, "Grid height").map_err(ValidationError::InvalidGrid)?;
        if cell_capacity == 0 {
            return Err(ValidationError::InvalidGrid(
                "Cell capacity must be positive, got: 0".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            cell_capacity,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Number of units of the given weight a single empty cell can hold.
    pub fn units_per_cell(&self, weight: u32) -> u32 {
        self.cell_capacity / weight.max(1)
    }
}

impl Default for GridDimensions {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            cell_capacity: Self::DEFAULT_CELL_CAPACITY,
        }
    }
}

impl Dimensional for GridDimensions {
    fn footprint(&self) -> Footprint {
        Footprint::new(self.width, self.height)
    }
}

/// Interned item key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

impl KeyId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.0)
    }
}

/// Interner mapping item keys to dense `KeyId`s in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct KeyTable {
    names: Vec<String>,
    ids: HashMap<String, KeyId>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `key`, allocating the next one on first sight.
    pub fn intern(&mut self, key: &str) -> KeyId {
        if let Some(id) = self.ids.get(key) {
            return *id;
        }
        let id = KeyId(self.names.len() as u32);
        self.names.push(key.to_owned());
        self.ids.insert(key.to_owned(), id);
        id
    }

    pub fn lookup(&self, key: &str) -> Option<KeyId> {
        self.ids.get(key).copied()
    }

    pub fn name(&self, id: KeyId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
