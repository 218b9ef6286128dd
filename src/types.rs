//! Common types and traits for 2D grid geometry.
//!
//! This module defines the integer coordinate types shared by the grid, the
//! placed groups and the packer, together with small trait abstractions for
//! anything that occupies or describes a rectangle of cells.

use serde::{Deserialize, Serialize};

/// Integer position of a cell in the grid.
///
/// `x` is the column (0..width), `y` is the row (0..height).
///
/// # Examples
/// ```
/// use grid_inventory::types::GridPos;
///
/// let origin = GridPos::origin();
/// let pos = GridPos::new(3, 2);
/// assert_eq!(pos.offset(1, 1), GridPos::new(4, 3));
/// assert_ne!(origin, pos);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridPos {
    pub x: usize,
    pub y: usize,
}

impl GridPos {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Top-left corner of the grid.
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0, 0)
    }

    /// Returns the position shifted by `dx` columns and `dy` rows.
    #[inline]
    pub const fn offset(&self, dx: usize, dy: usize) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    #[inline]
    pub const fn as_tuple(&self) -> (usize, usize) {
        (self.x, self.y)
    }
}

impl From<(usize, usize)> for GridPos {
    #[inline]
    fn from(tuple: (usize, usize)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

/// Rectangular size of an item measured in cells.
///
/// Serialized as a `[width, height]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Footprint {
    pub width: usize,
    pub height: usize,
}

impl Footprint {
    #[inline]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of cells covered.
    #[inline]
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// Checks that both extents are at least one cell.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Checks whether the footprint fits inside `outer` (component-wise <=).
    #[inline]
    pub const fn fits_within(&self, outer: &Footprint) -> bool {
        self.width <= outer.width && self.height <= outer.height
    }
}

impl From<(usize, usize)> for Footprint {
    #[inline]
    fn from(tuple: (usize, usize)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<Footprint> for (usize, usize) {
    #[inline]
    fn from(footprint: Footprint) -> Self {
        (footprint.width, footprint.height)
    }
}

/// Axis-aligned rectangle of cells: an origin plus a footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub origin: GridPos,
    pub size: Footprint,
}

impl Rect {
    #[inline]
    pub const fn new(origin: GridPos, size: Footprint) -> Self {
        Self { origin, size }
    }

    /// First column past the right edge.
    #[inline]
    pub const fn right(&self) -> usize {
        self.origin.x + self.size.width
    }

    /// First row past the bottom edge.
    #[inline]
    pub const fn bottom(&self) -> usize {
        self.origin.y + self.size.height
    }

    /// Iterates the covered positions column by column: for each column, every
    /// row top to bottom. The first yielded position is the origin.
    pub fn positions(&self) -> impl Iterator<Item = GridPos> + use<> {
        let Rect { origin, size } = *self;
        (origin.x..origin.x + size.width)
            .flat_map(move |x| (origin.y..origin.y + size.height).map(move |y| GridPos::new(x, y)))
    }

    #[inline]
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= self.origin.x && pos.x < self.right() && pos.y >= self.origin.y && pos.y < self.bottom()
    }
}

/// Trait for anything with a rectangular cell footprint.
pub trait Dimensional {
    fn footprint(&self) -> Footprint;

    fn area(&self) -> usize {
        self.footprint().area()
    }

    /// Checks if this object fits in a grid with the given extent.
    fn fits_in(&self, grid: &Footprint) -> bool {
        self.footprint().fits_within(grid)
    }
}

/// Trait for objects anchored at a grid position.
pub trait Positioned {
    /// Returns the top-left cell position.
    fn position(&self) -> GridPos;
}

/// Trait for objects with a per-unit weight.
pub trait Weighted {
    fn weight(&self) -> u32;
}

/// Validation helpers shared by the model constructors.
pub mod validation {
    use super::Footprint;

    /// Validates a single extent (width or height).
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_extent(value: usize, name: &str) -> Result<(), String> {
        if value == 0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a per-unit weight (must be at least 1).
    pub fn validate_weight(value: u32) -> Result<(), String> {
        if value == 0 {
            return Err(format!("Weight must be at least 1, got: {}", value));
        }
        Ok(())
    }

    /// Validates both extents of a footprint.
    pub fn validate_footprint(footprint: Footprint) -> Result<(), String> {
        validate_extent(footprint.width, "Width")?;
        validate_extent(footprint.height, "Height")?;
        Ok(())
    }
}
