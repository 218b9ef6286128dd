//! Placed groups: one stack of a single item type spread over a rectangle of cells.
//!
//! A group never owns its cells directly. It remembers the rectangle it spans
//! and mutates the cells through the [`Grid`] it lives in; the grid cells carry
//! the group's `GroupId` as their occupant. Groups are stored in a
//! [`GroupArena`] and addressed by index.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::cell::Cell;
use crate::error::ConsistencyError;
use crate::grid::Grid;
use crate::model::KeyId;
use crate::types::{Dimensional, Footprint, GridPos, Positioned, Rect, Weighted};

/// Index of a group inside its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(u32);

impl GroupId {
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Effect of a removal on the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupChange {
    /// The group could not give up the requested amount.
    Unchanged,
    /// Units were taken, the group still holds some.
    Reduced,
    /// The last unit was taken; the cells were reset and the group must be dropped.
    Emptied,
}

/// A rectangular block of cells occupied by one stack of one item type.
///
/// The top-left cell is the head; its fill value is authoritative and every
/// other cell mirrors it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedGroup {
    id: GroupId,
    key: KeyId,
    weight: u32,
    rect: Rect,
}

impl PlacedGroup {
    /// Creates a group over `rect` and tags its cells with the group identity.
    ///
    /// The cells keep whatever fill they had; a freshly found block is empty.
    pub fn create(
        grid: &mut Grid,
        id: GroupId,
        key: KeyId,
        weight: u32,
        rect: Rect,
    ) -> Result<Self, ConsistencyError> {
        let group = Self {
            id,
            key,
            weight,
            rect,
        };
        group.tag_cells(grid, 0)?;
        Ok(group)
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn key(&self) -> KeyId {
        self.key
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    fn head<'g>(&self, grid: &'g Grid) -> Result<&'g Cell, ConsistencyError> {
        grid.cell_checked(self.rect.origin)
    }

    /// Current fill value of the group (the head's value).
    pub fn quantity(&self, grid: &Grid) -> Result<u32, ConsistencyError> {
        Ok(self.head(grid)?.value())
    }

    /// Verifies that every cell carries `key`, belongs to this group and mirrors
    /// the head's fill. Returns the head cell.
    fn check<'g>(&self, grid: &'g Grid, key: KeyId) -> Result<&'g Cell, ConsistencyError> {
        let head = self.head(grid)?;
        for position in self.rect.positions() {
            let cell = grid.cell_checked(position)?;
            if cell.key() != Some(key) {
                return Err(ConsistencyError::KeyMismatch {
                    group: self.id,
                    position,
                    expected: key,
                    found: cell.key(),
                });
            }
            if cell.group() != Some(self.id) {
                return Err(ConsistencyError::ForeignCell {
                    group: self.id,
                    position,
                    found: cell.group(),
                });
            }
            if cell.value() != head.value() {
                return Err(ConsistencyError::FillMismatch {
                    group: self.id,
                    position,
                    expected: head.value(),
                    found: cell.value(),
                });
            }
        }
        Ok(head)
    }

    /// True when the head has at least `amount` free units.
    pub fn can_add(&self, grid: &Grid, key: KeyId, amount: u32) -> Result<bool, ConsistencyError> {
        Ok(self.check(grid, key)?.free_space() >= amount)
    }

    /// Adds `amount` to every cell if the group has room. Returns whether it did.
    pub fn try_add(
        &self,
        grid: &mut Grid,
        key: KeyId,
        amount: u32,
    ) -> Result<bool, ConsistencyError> {
        if !self.can_add(grid, key, amount)? {
            debug!(
                "{} cannot take {} more unit(s) of {}, free space {}",
                self.id,
                amount,
                key,
                self.head(grid)?.free_space()
            );
            return Ok(false);
        }
        self.apply_delta(grid, i64::from(amount))?;
        Ok(true)
    }

    /// True when the group holds at least `amount` units.
    pub fn can_remove(
        &self,
        grid: &Grid,
        key: KeyId,
        amount: u32,
    ) -> Result<bool, ConsistencyError> {
        Ok(self.check(grid, key)?.value() >= amount)
    }

    /// Takes `amount` from every cell. Disposes the group once it is empty.
    pub fn try_remove(
        &self,
        grid: &mut Grid,
        key: KeyId,
        amount: u32,
    ) -> Result<GroupChange, ConsistencyError> {
        if !self.can_remove(grid, key, amount)? {
            return Ok(GroupChange::Unchanged);
        }
        self.apply_delta(grid, -i64::from(amount))?;
        if self.quantity(grid)? == 0 {
            self.dispose(grid)?;
            return Ok(GroupChange::Emptied);
        }
        Ok(GroupChange::Reduced)
    }

    /// Resets every cell of the group to the empty state.
    pub fn dispose(&self, grid: &mut Grid) -> Result<(), ConsistencyError> {
        for position in self.rect.positions() {
            grid.cell_mut_checked(position)?.reset();
        }
        Ok(())
    }

    /// Moves the group onto `rect`, tagging the new cells and carrying `fill` over.
    ///
    /// Only used when a repacked layout is committed; the old cells are expected
    /// to have been rebuilt already.
    pub fn reanchor(
        &mut self,
        grid: &mut Grid,
        rect: Rect,
        fill: u32,
    ) -> Result<(), ConsistencyError> {
        self.rect = rect;
        self.tag_cells(grid, fill)
    }

    fn tag_cells(&self, grid: &mut Grid, fill: u32) -> Result<(), ConsistencyError> {
        for position in self.rect.positions() {
            let cell = grid.cell_mut_checked(position)?;
            cell.assign(self.id, self.key, self.weight);
            cell.add_value(i64::from(fill));
        }
        Ok(())
    }

    fn apply_delta(&self, grid: &mut Grid, delta: i64) -> Result<(), ConsistencyError> {
        for position in self.rect.positions() {
            grid.cell_mut_checked(position)?.add_value(delta);
        }
        Ok(())
    }
}

impl Dimensional for PlacedGroup {
    fn footprint(&self) -> Footprint {
        self.rect.size
    }
}

impl Positioned for PlacedGroup {
    fn position(&self) -> GridPos {
        self.rect.origin
    }
}

impl Weighted for PlacedGroup {
    fn weight(&self) -> u32 {
        self.weight
    }
}

/// Slot storage for groups. Vacated slots are reused, most recently freed first.
#[derive(Clone, Debug, Default)]
pub struct GroupArena {
    slots: Vec<Option<PlacedGroup>>,
    vacant: Vec<usize>,
}

impl GroupArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next `insert` will use.
    pub fn next_id(&self) -> GroupId {
        GroupId::new(self.vacant.last().copied().unwrap_or(self.slots.len()))
    }

    /// Stores a group under `group.id()`, which must be `next_id()`.
    pub fn insert(&mut self, group: PlacedGroup) -> GroupId {
        let id = group.id();
        match self.vacant.last() {
            Some(&slot) if slot == id.index() => {
                self.vacant.pop();
                self.slots[slot] = Some(group);
            }
            _ => {
                debug_assert_eq!(id.index(), self.slots.len());
                self.slots.push(Some(group));
            }
        }
        id
    }

    pub fn get(&self, id: GroupId) -> Option<&PlacedGroup> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut PlacedGroup> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: GroupId) -> Option<PlacedGroup> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            self.vacant.push(id.index());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedGroup> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GridDimensions, KeyTable};

    fn setup(width: usize, height: usize, capacity: u32) -> (Grid, KeyTable) {
        let grid = Grid::new(GridDimensions::new(width, height, capacity).unwrap());
        (grid, KeyTable::new())
    }

    fn rect(x: usize, y: usize, w: usize, h: usize) -> Rect {
        Rect::new(GridPos::new(x, y), Footprint::new(w, h))
    }

    #[test]
    fn add_mirrors_fill_across_all_cells() {
        let (mut grid, mut keys) = setup(4, 4, 3);
        let ore = keys.intern("ore");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(1, 1, 2, 2)).unwrap();

        assert!(group.try_add(&mut grid, ore, 2).unwrap());
        for pos in group.rect().positions() {
            assert_eq!(grid.cell(pos).unwrap().value(), 2);
            assert_eq!(grid.cell(pos).unwrap().group(), Some(GroupId::new(0)));
        }
        assert_eq!(group.quantity(&grid).unwrap(), 2);
        assert!(!group.try_add(&mut grid, ore, 2).unwrap());
        assert_eq!(group.quantity(&grid).unwrap(), 2);
    }

    #[test]
    fn weight_limits_units_per_group() {
        let (mut grid, mut keys) = setup(2, 2, 5);
        let ore = keys.intern("ore");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 2, rect(0, 0, 1, 1)).unwrap();

        assert!(group.try_add(&mut grid, ore, 1).unwrap());
        assert!(group.try_add(&mut grid, ore, 1).unwrap());
        assert!(!group.can_add(&grid, ore, 1).unwrap());
    }

    #[test]
    fn removing_last_unit_disposes_cells() {
        let (mut grid, mut keys) = setup(3, 3, 2);
        let ore = keys.intern("ore");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(0, 0, 2, 1)).unwrap();
        group.try_add(&mut grid, ore, 2).unwrap();

        assert_eq!(group.try_remove(&mut grid, ore, 1).unwrap(), GroupChange::Reduced);
        assert_eq!(group.try_remove(&mut grid, ore, 1).unwrap(), GroupChange::Emptied);
        for pos in group.rect().positions() {
            assert!(grid.cell(pos).unwrap().is_empty());
        }
        assert!(group.try_remove(&mut grid, ore, 1).is_err());
    }

    #[test]
    fn remove_more_than_held_is_unchanged() {
        let (mut grid, mut keys) = setup(2, 2, 4);
        let ore = keys.intern("ore");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(0, 0, 1, 1)).unwrap();
        group.try_add(&mut grid, ore, 1).unwrap();
        assert_eq!(group.try_remove(&mut grid, ore, 3).unwrap(), GroupChange::Unchanged);
        assert_eq!(group.quantity(&grid).unwrap(), 1);
    }

    #[test]
    fn key_mismatch_is_a_consistency_error() {
        let (mut grid, mut keys) = setup(2, 2, 4);
        let ore = keys.intern("ore");
        let plank = keys.intern("plank");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(0, 0, 2, 1)).unwrap();

        let err = group.can_add(&grid, plank, 1).unwrap_err();
        assert!(matches!(err, ConsistencyError::KeyMismatch { expected, .. } if expected == plank));
    }

    #[test]
    fn diverging_fill_is_a_consistency_error() {
        let (mut grid, mut keys) = setup(2, 2, 4);
        let ore = keys.intern("ore");
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(0, 0, 2, 1)).unwrap();
        grid.cell_mut_checked(GridPos::new(1, 0)).unwrap().add_value(1);

        let err = group.can_add(&grid, ore, 1).unwrap_err();
        assert!(matches!(
            err,
            ConsistencyError::FillMismatch {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn reanchor_carries_fill_to_new_cells() {
        let (mut grid, mut keys) = setup(4, 4, 5);
        let ore = keys.intern("ore");
        let mut group =
            PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect(0, 0, 1, 2)).unwrap();
        group.try_add(&mut grid, ore, 3).unwrap();

        group.dispose(&mut grid).unwrap();
        group.reanchor(&mut grid, rect(2, 1, 1, 2), 3).unwrap();
        assert_eq!(group.position(), GridPos::new(2, 1));
        assert_eq!(group.quantity(&grid).unwrap(), 3);
        assert!(group.can_add(&grid, ore, 2).unwrap());
        assert!(grid.cell(GridPos::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn arena_reuses_vacated_slots() {
        let (mut grid, mut keys) = setup(3, 1, 1);
        let ore = keys.intern("ore");
        let mut arena = GroupArena::new();
        for x in 0..3 {
            let id = arena.next_id();
            let group = PlacedGroup::create(&mut grid, id, ore, 1, rect(x, 0, 1, 1)).unwrap();
            arena.insert(group);
        }
        assert_eq!(arena.len(), 3);
        assert!(arena.remove(GroupId::new(1)).is_some());
        assert!(arena.get(GroupId::new(1)).is_none());
        assert_eq!(arena.next_id(), GroupId::new(1));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.iter().count(), 2);
    }
}
