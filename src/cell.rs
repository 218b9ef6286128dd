//! A single grid unit with a raw capacity, a fill value and its current occupant.

use crate::group::GroupId;
use crate::model::KeyId;
use crate::types::{GridPos, Positioned};

/// Identity of the group currently owning a cell.
///
/// Group id, item key and weight are set and cleared together, so a cell is
/// either fully tagged or fully empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occupant {
    pub group: GroupId,
    pub key: KeyId,
    pub weight: u32,
}

/// One cell of the grid.
///
/// The cell does not validate its own fill; the owning group checks free space
/// before it applies a delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    position: GridPos,
    raw_capacity: u32,
    value: u32,
    occupant: Option<Occupant>,
}

impl Cell {
    pub fn new(raw_capacity: u32, position: GridPos) -> Self {
        Self {
            position,
            raw_capacity,
            value: 0,
            occupant: None,
        }
    }

    pub fn raw_capacity(&self) -> u32 {
        self.raw_capacity
    }

    /// Current fill value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Per-unit weight of the occupying item, 1 when empty.
    pub fn weight(&self) -> u32 {
        self.occupant.map_or(1, |o| o.weight.max(1))
    }

    /// Effective capacity: `floor(raw_capacity / weight)`.
    pub fn capacity(&self) -> u32 {
        self.raw_capacity / self.weight()
    }

    pub fn free_space(&self) -> u32 {
        self.capacity().saturating_sub(self.value)
    }

    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    pub fn group(&self) -> Option<GroupId> {
        self.occupant.map(|o| o.group)
    }

    pub fn key(&self) -> Option<KeyId> {
        self.occupant.map(|o| o.key)
    }

    /// True when no group owns the cell and it holds nothing.
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none() && self.value == 0
    }

    /// Tags the cell with the owning group's identity and per-unit weight.
    pub fn assign(&mut self, group: GroupId, key: KeyId, weight: u32) {
        self.occupant = Some(Occupant { group, key, weight });
    }

    /// Changes the per-unit weight of an occupied cell. No-op on an empty cell.
    pub fn set_weight(&mut self, weight: u32) {
        if let Some(occupant) = self.occupant.as_mut() {
            occupant.weight = weight;
        }
    }

    /// Adds a signed delta to the fill value.
    pub fn add_value(&mut self, delta: i64) {
        let next = i64::from(self.value) + delta;
        self.value = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
    }

    /// Clears fill and identity, returning the cell to the empty state.
    pub fn reset(&mut self) {
        self.value = 0;
        self.occupant = None;
    }
}

impl Positioned for Cell {
    fn position(&self) -> GridPos {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyTable;

    #[test]
    fn empty_cell_uses_unit_weight() {
        let cell = Cell::new(5, GridPos::new(1, 2));
        assert!(cell.is_empty());
        assert_eq!(cell.weight(), 1);
        assert_eq!(cell.capacity(), 5);
        assert_eq!(cell.free_space(), 5);
        assert_eq!(cell.position(), GridPos::new(1, 2));
    }

    #[test]
    fn weight_scales_effective_capacity() {
        let mut keys = KeyTable::new();
        let mut cell = Cell::new(5, GridPos::origin());
        cell.assign(GroupId::new(0), keys.intern("ore"), 2);
        assert_eq!(cell.capacity(), 2);
        cell.add_value(1);
        assert_eq!(cell.free_space(), 1);
        cell.set_weight(5);
        assert_eq!(cell.capacity(), 1);
        assert_eq!(cell.free_space(), 0);
    }

    #[test]
    fn reset_clears_identity_and_fill() {
        let mut keys = KeyTable::new();
        let mut cell = Cell::new(3, GridPos::origin());
        cell.assign(GroupId::new(4), keys.intern("ore"), 1);
        cell.add_value(3);
        assert_eq!(cell.group(), Some(GroupId::new(4)));
        cell.reset();
        assert!(cell.is_empty());
        assert_eq!(cell.occupant(), None);
        assert_eq!(cell.free_space(), 3);
    }

    #[test]
    fn negative_delta_never_wraps() {
        let mut cell = Cell::new(3, GridPos::origin());
        cell.add_value(2);
        cell.add_value(-5);
        assert_eq!(cell.value(), 0);
    }
}
