//! Geometric helpers for rectangle overlap and bounds checks on the cell grid.
//!
//! Used by the packer to verify a computed layout before it is offered to the grid.

use crate::types::{Footprint, Rect};

/// Checks whether two rectangles share at least one cell.
///
/// Two rectangles do NOT intersect when they are separated along at least one axis.
///
/// # Examples
/// ```
/// use grid_inventory::geometry::intersects;
/// use grid_inventory::types::{Footprint, GridPos, Rect};
///
/// let a = Rect::new(GridPos::new(0, 0), Footprint::new(2, 2));
/// let b = Rect::new(GridPos::new(2, 0), Footprint::new(1, 1));
/// assert!(!intersects(&a, &b));
/// ```
pub fn intersects(a: &Rect, b: &Rect) -> bool {
    !(a.right() <= b.origin.x
        || b.right() <= a.origin.x
        || a.bottom() <= b.origin.y
        || b.bottom() <= a.origin.y)
}

/// Length of the overlap of two half-open intervals, at least 0.
pub fn overlap_1d(a1: usize, a2: usize, b1: usize, b2: usize) -> usize {
    a2.min(b2).saturating_sub(a1.max(b1))
}

/// Number of cells two rectangles have in common.
pub fn overlap_area(a: &Rect, b: &Rect) -> usize {
    let overlap_x = overlap_1d(a.origin.x, a.right(), b.origin.x, b.right());
    let overlap_y = overlap_1d(a.origin.y, a.bottom(), b.origin.y, b.bottom());
    overlap_x * overlap_y
}

/// Checks whether the rectangle lies completely inside a grid of the given extent.
pub fn within_bounds(rect: &Rect, bounds: &Footprint) -> bool {
    rect.right() <= bounds.width && rect.bottom() <= bounds.height
}
