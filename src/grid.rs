//! The cell matrix.
//!
//! Owns exactly one [`Cell`] per position, answers "where can an item of this
//! footprint and weight go?" and can be rebuilt from a packed layout.

use std::fmt::Write as _;

use log::trace;

use crate::cell::Cell;
use crate::error::ConsistencyError;
use crate::group::{GroupArena, GroupId};
use crate::model::{GridDimensions, KeyId};
use crate::packer::PlacementRecord;
use crate::types::{Dimensional, Footprint, GridPos, Rect};

/// Block returned by [`Grid::find_available_cells`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBlock {
    pub rect: Rect,
    /// Group that already owns every cell of the block, if any.
    pub occupant: Option<GroupId>,
}

/// Fixed-size grid of capacity cells.
///
/// Cells are stored column by column (`x * height + y`), which is also the
/// order the placement search visits origins in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    dimensions: GridDimensions,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(dimensions: GridDimensions) -> Self {
        let mut cells = Vec::with_capacity(dimensions.cell_count());
        for x in 0..dimensions.width {
            for y in 0..dimensions.height {
                cells.push(Cell::new(dimensions.cell_capacity, GridPos::new(x, y)));
            }
        }
        Self { dimensions, cells }
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    pub fn width(&self) -> usize {
        self.dimensions.width
    }

    pub fn height(&self) -> usize {
        self.dimensions.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        (pos.x < self.width() && pos.y < self.height()).then(|| pos.x * self.height() + pos.y)
    }

    pub fn cell(&self, pos: GridPos) -> Option<&Cell> {
        self.index(pos).map(|idx| &self.cells[idx])
    }

    fn out_of_bounds(&self, position: GridPos) -> ConsistencyError {
        ConsistencyError::OutOfBounds {
            position,
            width: self.width(),
            height: self.height(),
        }
    }

    pub(crate) fn cell_checked(&self, pos: GridPos) -> Result<&Cell, ConsistencyError> {
        self.cell(pos).ok_or_else(|| self.out_of_bounds(pos))
    }

    pub(crate) fn cell_mut_checked(&mut self, pos: GridPos) -> Result<&mut Cell, ConsistencyError> {
        match self.index(pos) {
            Some(idx) => Ok(&mut self.cells[idx]),
            None => Err(self.out_of_bounds(pos)),
        }
    }

    /// All cells, column by column.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Cells of `rect` in column-major order, or `None` if it leaves the grid.
    pub fn block(&self, rect: Rect) -> Option<Vec<&Cell>> {
        rect.positions().map(|pos| self.cell(pos)).collect()
    }

    /// Number of cells with no occupant.
    pub fn empty_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_empty()).count()
    }

    /// Searches for a block of `size` cells that can take one unit of `weight`.
    ///
    /// Two passes over the origins, column by column:
    /// 1. a stackable block: every cell has the same occupant (or none), the same
    ///    free space, and at least `weight` of it; occupied blocks must carry `key`.
    /// 2. a free block: every cell has zero fill.
    ///
    /// The second pass stops one origin short of the far edge on both axes, so on
    /// tight grids it never considers the last column or row.
    pub fn find_available_cells(&self, size: Footprint, weight: u32, key: KeyId) -> Option<CellBlock> {
        let (width, height) = (self.width(), self.height());
        if !size.is_valid() || width < size.width || height < size.height {
            return None;
        }

        for x in 0..width - (size.width - 1) {
            for y in 0..height - (size.height - 1) {
                let rect = Rect::new(GridPos::new(x, y), size);
                if let Some(occupant) = self.stackable_block(rect, weight, key) {
                    trace!("Stackable block at {:?} (occupant {:?})", rect.origin, occupant);
                    return Some(CellBlock { rect, occupant });
                }
            }
        }

        for x in 0..width - size.width {
            for y in 0..height - size.height {
                let rect = Rect::new(GridPos::new(x, y), size);
                if self.free_block(rect) {
                    trace!("Free block at {:?}", rect.origin);
                    return Some(CellBlock {
                        rect,
                        occupant: None,
                    });
                }
            }
        }

        None
    }

    /// Returns `Some(occupant)` when `rect` passes the stackable test.
    fn stackable_block(&self, rect: Rect, weight: u32, key: KeyId) -> Option<Option<GroupId>> {
        let cells = self.block(rect)?;
        let head = *cells.first()?;
        if head.key().is_some_and(|k| k != key) {
            return None;
        }
        let identity = (head.group(), head.key());
        let uniform = cells.iter().all(|cell| {
            cell.free_space() >= weight
                && cell.free_space() == head.free_space()
                && (cell.group(), cell.key()) == identity
        });
        uniform.then_some(head.group())
    }

    fn free_block(&self, rect: Rect) -> bool {
        self.block(rect)
            .is_some_and(|cells| !cells.is_empty() && cells.iter().all(|c| c.value() == 0))
    }

    /// Replaces the cells with the layout described by `placements`.
    ///
    /// Every placement and group is checked before anything is touched, so an
    /// error leaves the grid as it was. On success every group named in
    /// `placements` is re-anchored onto fresh cells with its fill carried over,
    /// and every other position is empty.
    pub fn rebuild_from_layout(
        &mut self,
        placements: &[PlacementRecord],
        groups: &mut GroupArena,
    ) -> Result<(), ConsistencyError> {
        let mut staged = Vec::with_capacity(placements.len());
        for record in placements {
            let group = groups
                .get(record.group)
                .ok_or(ConsistencyError::UnknownGroup(record.group))?;
            let rect = Rect::new(record.origin, group.footprint());
            if rect.right() > self.width() || rect.bottom() > self.height() {
                return Err(self.out_of_bounds(GridPos::new(rect.right() - 1, rect.bottom() - 1)));
            }
            let fill = group.quantity(self)?;
            staged.push((record.group, rect, fill));
        }

        let mut rebuilt = Grid::new(self.dimensions);
        for &(id, rect, fill) in &staged {
            if let Some(group) = groups.get_mut(id) {
                group.reanchor(&mut rebuilt, rect, fill)?;
            }
        }
        *self = rebuilt;
        Ok(())
    }

    /// Text dump of the matrix: one line per column index, `[fill]|[capacity]` per cell.
    pub fn render_matrix(&self) -> String {
        let mut text = String::from("Grid matrix:\n");
        for x in 0..self.width() {
            for y in 0..self.height() {
                if let Some(cell) = self.cell(GridPos::new(x, y)) {
                    let _ = write!(text, "[{}]|[{}]\t", cell.value(), cell.capacity());
                }
            }
            text.push('\n');
        }
        text
    }
}

impl Dimensional for Grid {
    fn footprint(&self) -> Footprint {
        self.dimensions.footprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::PlacedGroup;
    use crate::model::KeyTable;
    use crate::types::Positioned;

    fn grid(width: usize, height: usize, capacity: u32) -> Grid {
        Grid::new(GridDimensions::new(width, height, capacity).unwrap())
    }

    #[test]
    fn every_position_holds_one_cell() {
        let grid = grid(3, 4, 2);
        assert_eq!(grid.cells().count(), 12);
        for cell in grid.cells() {
            assert_eq!(grid.cell(cell.position()), Some(cell));
            assert_eq!(cell.raw_capacity(), 2);
        }
        assert!(grid.cell(GridPos::new(3, 0)).is_none());
        assert!(grid.cell(GridPos::new(0, 4)).is_none());
    }

    #[test]
    fn empty_grid_places_at_origin() {
        let grid = grid(5, 5, 1);
        let mut keys = KeyTable::new();
        let block = grid
            .find_available_cells(Footprint::new(2, 3), 1, keys.intern("ore"))
            .unwrap();
        assert_eq!(block.rect.origin, GridPos::origin());
        assert_eq!(block.occupant, None);
    }

    #[test]
    fn search_walks_down_the_column_first() {
        let mut grid = grid(4, 4, 1);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        let plank = keys.intern("plank");
        let rect = Rect::new(GridPos::origin(), Footprint::new(2, 1));
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect).unwrap();
        group.try_add(&mut grid, ore, 1).unwrap();

        let block = grid.find_available_cells(Footprint::new(1, 1), 1, plank).unwrap();
        assert_eq!(block.rect.origin, GridPos::new(0, 1));
    }

    #[test]
    fn foreign_groups_with_room_are_skipped() {
        let mut grid = grid(2, 1, 4);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        let plank = keys.intern("plank");
        let rect = Rect::new(GridPos::origin(), Footprint::new(1, 1));
        let group = PlacedGroup::create(&mut grid, GroupId::new(0), ore, 1, rect).unwrap();
        group.try_add(&mut grid, ore, 1).unwrap();

        let block = grid.find_available_cells(Footprint::new(1, 1), 1, plank).unwrap();
        assert_eq!(block.rect.origin, GridPos::new(1, 0));

        let own = grid.find_available_cells(Footprint::new(1, 1), 1, ore).unwrap();
        assert_eq!(own.rect.origin, GridPos::origin());
        assert_eq!(own.occupant, Some(GroupId::new(0)));
    }

    #[test]
    fn footprint_larger_than_grid_finds_nothing() {
        let grid = grid(3, 3, 1);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        assert!(grid.find_available_cells(Footprint::new(4, 1), 1, ore).is_none());
        assert!(grid.find_available_cells(Footprint::new(1, 4), 1, ore).is_none());
    }

    #[test]
    fn stackable_pass_reaches_the_last_row_and_column() {
        let mut grid = grid(2, 2, 1);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        let plank = keys.intern("plank");
        for (idx, (x, y)) in [(0, 0), (0, 1), (1, 0)].into_iter().enumerate() {
            let rect = Rect::new(GridPos::new(x, y), Footprint::new(1, 1));
            let group = PlacedGroup::create(&mut grid, GroupId::new(idx), ore, 1, rect).unwrap();
            group.try_add(&mut grid, ore, 1).unwrap();
        }
        let block = grid.find_available_cells(Footprint::new(1, 1), 1, plank).unwrap();
        assert_eq!(block.rect.origin, GridPos::new(1, 1));
    }

    #[test]
    fn free_pass_stops_short_of_the_far_edge() {
        // Capacity 1 cannot hold a weight-2 unit, so only the free pass can match.
        let grid = grid(2, 2, 1);
        let mut keys = KeyTable::new();
        let heavy = keys.intern("anvil");

        let small = grid.find_available_cells(Footprint::new(1, 1), 2, heavy).unwrap();
        assert_eq!(small.rect.origin, GridPos::origin());

        // The whole grid is free, but the free pass has no origin for a 2x2 block.
        assert!(grid.find_available_cells(Footprint::new(2, 2), 2, heavy).is_none());
        // A 1-wide grid never yields a free block at all.
        let narrow = Grid::new(GridDimensions::new(1, 3, 1).unwrap());
        assert!(narrow.find_available_cells(Footprint::new(1, 1), 2, heavy).is_none());
    }

    #[test]
    fn rebuild_moves_groups_and_clears_the_rest() {
        let mut grid = grid(3, 3, 4);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        let mut groups = GroupArena::new();
        let id = groups.next_id();
        let rect = Rect::new(GridPos::new(2, 1), Footprint::new(1, 2));
        let group = PlacedGroup::create(&mut grid, id, ore, 1, rect).unwrap();
        group.try_add(&mut grid, ore, 3).unwrap();
        groups.insert(group);

        let placements = [PlacementRecord {
            origin: GridPos::origin(),
            group: id,
            size: Footprint::new(1, 2),
        }];
        grid.rebuild_from_layout(&placements, &mut groups).unwrap();

        let moved = groups.get(id).unwrap();
        assert_eq!(moved.position(), GridPos::origin());
        assert_eq!(moved.quantity(&grid).unwrap(), 3);
        assert!(grid.cell(GridPos::new(2, 1)).unwrap().is_empty());
        assert!(grid.cell(GridPos::new(2, 2)).unwrap().is_empty());
        assert_eq!(grid.empty_cell_count(), 7);
    }

    #[test]
    fn rebuild_rejects_out_of_bounds_without_touching_cells() {
        let mut grid = grid(2, 2, 1);
        let mut keys = KeyTable::new();
        let ore = keys.intern("ore");
        let mut groups = GroupArena::new();
        let id = groups.next_id();
        let rect = Rect::new(GridPos::origin(), Footprint::new(1, 1));
        let group = PlacedGroup::create(&mut grid, id, ore, 1, rect).unwrap();
        group.try_add(&mut grid, ore, 1).unwrap();
        groups.insert(group);
        let before = grid.clone();

        let placements = [PlacementRecord {
            origin: GridPos::new(2, 0),
            group: id,
            size: Footprint::new(1, 1),
        }];
        assert!(grid.rebuild_from_layout(&placements, &mut groups).is_err());
        assert_eq!(grid, before);
        assert_eq!(groups.get(id).unwrap().position(), GridPos::origin());
    }

    #[test]
    fn render_matrix_lists_fill_and_capacity() {
        let grid = grid(2, 3, 5);
        let text = grid.render_matrix();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.matches("[0]|[5]").count(), 6);
    }
}
