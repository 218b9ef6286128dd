//! Repacking logic for defragmenting the grid.
//!
//! Shelf heuristic over horizontal sectors:
//! - groups are seated tallest first (ties: widest first)
//! - each sector is a band as tall as the tallest unplaced group, with a
//!   remaining-height counter per column
//! - the leftover space under short items is carved into sub-sectors and filled
//!   with the smaller groups
//!
//! The packer never touches the grid; it only proposes a layout. A complete
//! layout has been checked for bounds and overlaps before it is returned.

use std::fmt;

use log::{debug, trace, warn};

use crate::geometry::{intersects, overlap_area, within_bounds};
use crate::group::GroupId;
use crate::types::{Footprint, GridPos, Rect};

/// A group to be re-placed, described by its footprint only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackingItem {
    pub group: GroupId,
    pub size: Footprint,
}

/// One seated group: origin column/row plus the group it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementRecord {
    pub origin: GridPos,
    pub group: GroupId,
    pub size: Footprint,
}

impl PlacementRecord {
    pub fn rect(&self) -> Rect {
        Rect::new(self.origin, self.size)
    }
}

/// Reasons why a group could not be re-placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    ExceedsGrid,
    NoSectorSpace,
    Overlap,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::ExceedsGrid => "exceeds_grid",
            UnplacedReason::NoSectorSpace => "no_sector_space",
            UnplacedReason::Overlap => "overlap",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::ExceedsGrid => {
                write!(f, "Footprint is larger than the grid in at least one dimension")
            }
            UnplacedReason::NoSectorSpace => {
                write!(f, "No sector had room left before the grid height ran out")
            }
            UnplacedReason::Overlap => write!(f, "Seated position overlaps another group"),
        }
    }
}

/// Group that did not receive a valid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnplacedGroup {
    pub item: PackingItem,
    pub reason: UnplacedReason,
}

/// Result of a packing attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackingOutcome {
    pub placements: Vec<PlacementRecord>,
    pub unplaced: Vec<UnplacedGroup>,
}

impl PackingOutcome {
    /// Every group received a checked position.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    pub fn placement_of(&self, group: GroupId) -> Option<&PlacementRecord> {
        self.placements.iter().find(|p| p.group == group)
    }
}

/// Horizontal band of the grid with a remaining-height counter per column.
///
/// Counters are signed: seating only checks the anchor column, so a wide item
/// can push a shorter neighbour below zero. Such a layout overlaps and is
/// rejected by the final check.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Sector {
    column: usize,
    row: usize,
    height: usize,
    remaining: Vec<isize>,
}

impl Sector {
    fn new(column: usize, row: usize, width: usize, height: usize) -> Self {
        Self {
            column,
            row,
            height,
            remaining: vec![height as isize; width],
        }
    }

    fn full_height(&self) -> isize {
        self.height as isize
    }

    /// Every column has received at least one item.
    fn all_columns_started(&self) -> bool {
        self.remaining.iter().all(|&r| r < self.full_height())
    }

    fn all_columns_filled(&self) -> bool {
        self.remaining.iter().all(|&r| r == 0)
    }

    fn has_free_column(&self) -> bool {
        self.remaining.iter().any(|&r| r > 0)
    }

    /// Leftmost column with the largest remaining height.
    fn leftmost_tallest(&self) -> usize {
        let mut best = 0;
        for (idx, &r) in self.remaining.iter().enumerate() {
            if r > self.remaining[best] {
                best = idx;
            }
        }
        best
    }

    /// Rightmost column with the largest remaining height.
    fn rightmost_tallest(&self) -> usize {
        let mut best = self.remaining.len().saturating_sub(1);
        for (idx, &r) in self.remaining.iter().enumerate().rev() {
            if r > self.remaining[best] {
                best = idx;
            }
        }
        best
    }

    /// Seats `size` at the leftmost tallest column. Returns the grid origin on success.
    fn try_seat(&mut self, size: Footprint) -> Option<GridPos> {
        if self.remaining.is_empty() {
            return None;
        }
        let col = self.leftmost_tallest();
        if col + size.width > self.remaining.len() {
            return None;
        }
        let free = self.remaining[col];
        let height = size.height as isize;
        if height > free {
            return None;
        }

        let origin = GridPos::new(
            self.column + col,
            self.row + (self.full_height() - free) as usize,
        );
        for r in &mut self.remaining[col..col + size.width] {
            *r -= height;
        }
        Some(origin)
    }

    /// Carves the sub-sector right of the tallest free run.
    ///
    /// Width is the run of columns sharing the rightmost maximum, extended to the
    /// left; it sits at the bottom of this sector.
    fn carve(&self) -> Sector {
        let end = self.rightmost_tallest();
        let free = self.remaining[end];
        let width = self.remaining[..=end]
            .iter()
            .rev()
            .take_while(|&&r| r == free)
            .count();
        let start = end + 1 - width;
        let height = free.max(0) as usize;
        Sector::new(self.column + start, self.row + (self.height - height), width, height)
    }

    /// Height consumed in each column of this sector.
    fn consumed(&self) -> Vec<isize> {
        self.remaining.iter().map(|&r| self.full_height() - r).collect()
    }

    /// Applies a sub-sector's consumption to the matching columns here.
    fn absorb(&mut self, sub: &Sector) {
        let offset = sub.column - self.column;
        for (idx, used) in sub.consumed().into_iter().enumerate() {
            self.remaining[offset + idx] -= used;
        }
    }
}

/// Shelf packer for a fixed grid extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packer {
    width: usize,
    height: usize,
}

impl Packer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Computes a new position for every item.
    ///
    /// Items keep their footprint; the input order only matters between items
    /// of identical footprint (the sort is stable).
    pub fn pack(&self, items: &[PackingItem]) -> PackingOutcome {
        let mut pending = items.to_vec();
        pending.sort_by(|a, b| {
            b.size
                .height
                .cmp(&a.size.height)
                .then_with(|| b.size.width.cmp(&a.size.width))
        });

        let mut placements = Vec::with_capacity(pending.len());
        let mut row = 0;
        while let Some(first) = pending.first() {
            if row >= self.height {
                break;
            }
            let band = first.size.height.min(self.height - row);
            let mut sector = Sector::new(0, row, self.width, band);
            trace!("Sector opened at row {} with height {}", row, band);

            fill(&mut sector, &mut pending, &mut placements, Sector::all_columns_started);
            self.fill_sub_sectors(&mut sector, &mut pending, &mut placements);
            trace!("Sector at row {} closed with {:?}", row, sector.remaining);

            row += sector.height;
        }

        if !pending.is_empty() {
            let grid = Footprint::new(self.width, self.height);
            let unplaced = pending
                .into_iter()
                .map(|item| UnplacedGroup {
                    item,
                    reason: if item.size.fits_within(&grid) {
                        UnplacedReason::NoSectorSpace
                    } else {
                        UnplacedReason::ExceedsGrid
                    },
                })
                .collect::<Vec<_>>();
            debug!(
                "Packing left {} of {} group(s) unplaced",
                unplaced.len(),
                items.len()
            );
            return PackingOutcome {
                placements,
                unplaced,
            };
        }

        let unplaced = self.check_layout(&placements);
        PackingOutcome {
            placements,
            unplaced,
        }
    }

    fn fill_sub_sectors(
        &self,
        sector: &mut Sector,
        pending: &mut Vec<PackingItem>,
        placements: &mut Vec<PlacementRecord>,
    ) {
        while !pending.is_empty() && sector.has_free_column() {
            let mut sub = sector.carve();
            trace!(
                "Sub-sector at ({}, {}) sized {}x{}",
                sub.column,
                sub.row,
                sub.remaining.len(),
                sub.height
            );
            let seated = fill(&mut sub, pending, placements, Sector::all_columns_filled);
            if seated == 0 {
                break;
            }
            sector.absorb(&sub);
        }
    }

    /// Verifies bounds and pairwise disjointness of a finished layout.
    fn check_layout(&self, placements: &[PlacementRecord]) -> Vec<UnplacedGroup> {
        let bounds = Footprint::new(self.width, self.height);
        let mut rejected = Vec::new();
        for (idx, record) in placements.iter().enumerate() {
            let rect = record.rect();
            let item = PackingItem {
                group: record.group,
                size: record.size,
            };
            if !within_bounds(&rect, &bounds) {
                warn!("Packed {} at {:?} leaves the grid", record.group, record.origin);
                rejected.push(UnplacedGroup {
                    item,
                    reason: UnplacedReason::ExceedsGrid,
                });
                continue;
            }
            if let Some(other) = placements[..idx]
                .iter()
                .find(|other| intersects(&rect, &other.rect()))
            {
                warn!(
                    "Packed {} at {:?} overlaps {} by {} cell(s)",
                    record.group,
                    record.origin,
                    other.group,
                    overlap_area(&rect, &other.rect())
                );
                rejected.push(UnplacedGroup {
                    item,
                    reason: UnplacedReason::Overlap,
                });
            }
        }
        rejected
    }
}

/// Walks the pending items once in order, seating what fits, until `done` holds.
/// Returns how many items were seated.
fn fill(
    sector: &mut Sector,
    pending: &mut Vec<PackingItem>,
    placements: &mut Vec<PlacementRecord>,
    done: fn(&Sector) -> bool,
) -> usize {
    let mut seated = 0;
    let mut idx = 0;
    while idx < pending.len() {
        if done(sector) {
            break;
        }
        match sector.try_seat(pending[idx].size) {
            Some(origin) => {
                let item = pending.remove(idx);
                placements.push(PlacementRecord {
                    origin,
                    group: item.group,
                    size: item.size,
                });
                seated += 1;
            }
            None => idx += 1,
        }
    }
    seated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(sizes: &[(usize, usize)]) -> Vec<PackingItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(idx, &(w, h))| PackingItem {
                group: GroupId::new(idx),
                size: Footprint::new(w, h),
            })
            .collect()
    }

    fn origin_of(outcome: &PackingOutcome, group: usize) -> GridPos {
        outcome.placement_of(GroupId::new(group)).unwrap().origin
    }

    #[test]
    fn empty_input_is_complete() {
        let outcome = Packer::new(4, 4).pack(&[]);
        assert!(outcome.is_complete());
        assert_eq!(outcome.placed_count(), 0);
    }

    #[test]
    fn tallest_items_are_seated_first_left_to_right() {
        let outcome = Packer::new(6, 4).pack(&items(&[(1, 1), (2, 3), (3, 3)]));
        assert!(outcome.is_complete());
        // 3x3 is widest among the tallest, so it takes column 0.
        assert_eq!(origin_of(&outcome, 2), GridPos::new(0, 0));
        assert_eq!(origin_of(&outcome, 1), GridPos::new(3, 0));
        assert_eq!(origin_of(&outcome, 0), GridPos::new(5, 0));
    }

    #[test]
    fn short_items_fill_the_space_under_a_sector() {
        // Sector height 2 from the 1x2 item; the 3x1 items go into the carved band below.
        let outcome = Packer::new(4, 2).pack(&items(&[(1, 2), (3, 1), (3, 1)]));
        assert!(outcome.is_complete());
        assert_eq!(origin_of(&outcome, 0), GridPos::new(0, 0));
        assert_eq!(origin_of(&outcome, 1), GridPos::new(1, 0));
        assert_eq!(origin_of(&outcome, 2), GridPos::new(1, 1));
    }

    #[test]
    fn sectors_stack_down_the_grid() {
        let outcome = Packer::new(2, 3).pack(&items(&[(2, 2), (2, 1)]));
        assert!(outcome.is_complete());
        assert_eq!(origin_of(&outcome, 0), GridPos::new(0, 0));
        assert_eq!(origin_of(&outcome, 1), GridPos::new(0, 2));
    }

    #[test]
    fn too_wide_item_is_reported() {
        let outcome = Packer::new(3, 3).pack(&items(&[(4, 1)]));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.unplaced[0].reason, UnplacedReason::ExceedsGrid);
        assert_eq!(outcome.unplaced[0].reason.code(), "exceeds_grid");
    }

    #[test]
    fn running_out_of_height_fails() {
        let outcome = Packer::new(2, 2).pack(&items(&[(2, 1), (2, 1), (2, 1)]));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.placed_count(), 2);
        assert_eq!(outcome.unplaced_count(), 1);
        assert_eq!(outcome.unplaced[0].reason, UnplacedReason::NoSectorSpace);
    }

    #[test]
    fn sub_sector_selects_rightmost_tallest_run() {
        let mut sector = Sector::new(0, 0, 5, 3);
        sector.remaining = vec![0, 2, 2, 1, 2];
        let sub = sector.carve();
        assert_eq!(sub.column, 4);
        assert_eq!(sub.remaining.len(), 1);
        assert_eq!(sub.height, 2);
        assert_eq!(sub.row, 1);

        sector.remaining = vec![0, 2, 2, 2, 1];
        let sub = sector.carve();
        assert_eq!(sub.column, 1);
        assert_eq!(sub.remaining.len(), 3);
    }

    #[test]
    fn absorb_subtracts_only_consumed_height() {
        let mut sector = Sector::new(0, 0, 4, 3);
        sector.remaining = vec![0, 2, 2, 2];
        let mut sub = sector.carve();
        assert!(sub.try_seat(Footprint::new(2, 1)).is_some());
        sector.absorb(&sub);
        assert_eq!(sector.remaining, vec![0, 1, 1, 2]);
    }

    #[test]
    fn leftmost_tallest_prefers_first_maximum() {
        let mut sector = Sector::new(0, 0, 4, 3);
        sector.remaining = vec![1, 3, 3, 2];
        assert_eq!(sector.leftmost_tallest(), 1);
        assert_eq!(sector.rightmost_tallest(), 2);
    }

    #[test]
    fn seating_a_wide_item_over_a_shorter_column_is_rejected_by_the_check() {
        let packer = Packer::new(2, 2);
        let placements = [
            PlacementRecord {
                origin: GridPos::new(0, 0),
                group: GroupId::new(0),
                size: Footprint::new(1, 1),
            },
            PlacementRecord {
                origin: GridPos::new(0, 0),
                group: GroupId::new(1),
                size: Footprint::new(2, 1),
            },
        ];
        let rejected = packer.check_layout(&placements);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].item.group, GroupId::new(1));
        assert_eq!(rejected[0].reason, UnplacedReason::Overlap);
    }

    #[test]
    fn packing_is_deterministic() {
        let input = items(&[(5, 2), (4, 1), (3, 1), (3, 1), (2, 2), (1, 3), (1, 1)]);
        let first = Packer::new(10, 10).pack(&input);
        let second = Packer::new(10, 10).pack(&input);
        assert_eq!(first, second);
        assert!(first.is_complete());
    }
}
