//! The inventory orchestrator.
//!
//! The only component callers talk to. Holds the live [`Grid`], the group arena
//! and the per-key index, and runs the add pipeline: stack onto an existing
//! group, place into a free block, or (when allowed) repack everything and try
//! the placement again.

use std::fmt;

use log::{Level, debug, error, info, log_enabled, warn};
use serde::Serialize;

use crate::config::InventoryConfig;
use crate::error::{ConsistencyError, InventoryResult};
use crate::grid::Grid;
use crate::group::{GroupArena, GroupChange, GroupId, PlacedGroup};
use crate::model::{GridDimensions, ItemDescriptor, KeyId, KeyTable};
use crate::packer::{Packer, PackingItem};
use crate::types::{Dimensional, Footprint, GridPos, Positioned, Rect};

/// Where a unit ended up after a successful add or remove.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemPlacement {
    pub key: String,
    pub group: GroupId,
    pub position: GridPos,
    pub quantity: u32,
}

/// Why an add could not be satisfied. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// A single cell cannot hold even one unit of this weight.
    TooHeavy,
    /// The footprint does not fit the grid at all.
    ExceedsGrid,
    /// No group had room and no block was available; repacking was not allowed.
    NoSpace,
    /// The packer could not find a layout for the groups already placed.
    RepackFailed,
    /// The repacked layout still left no block for the new item.
    NoSpaceAfterRepack,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::TooHeavy => "too_heavy",
            RejectReason::ExceedsGrid => "exceeds_grid",
            RejectReason::NoSpace => "no_space",
            RejectReason::RepackFailed => "repack_failed",
            RejectReason::NoSpaceAfterRepack => "no_space_after_repack",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooHeavy => write!(f, "A cell cannot hold a single unit of this item"),
            RejectReason::ExceedsGrid => write!(f, "Item footprint is larger than the grid"),
            RejectReason::NoSpace => write!(f, "No group with room and no free block"),
            RejectReason::RepackFailed => write!(f, "Repacking could not fit the placed groups"),
            RejectReason::NoSpaceAfterRepack => {
                write!(f, "No free block even after repacking")
            }
        }
    }
}

/// Result of [`Inventory::add`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The unit went onto an existing group.
    Stacked(ItemPlacement),
    /// A new group was created in free space.
    Placed(ItemPlacement),
    /// A new group was created after the grid was repacked.
    Repacked(ItemPlacement),
    Rejected(RejectReason),
}

impl AddOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, AddOutcome::Rejected(_))
    }

    pub fn placement(&self) -> Option<&ItemPlacement> {
        match self {
            AddOutcome::Stacked(p) | AddOutcome::Placed(p) | AddOutcome::Repacked(p) => Some(p),
            AddOutcome::Rejected(_) => None,
        }
    }

    pub fn position(&self) -> Option<GridPos> {
        self.placement().map(|p| p.position)
    }
}

/// Result of [`Inventory::remove`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// One unit was taken; the group still holds the rest.
    Removed(ItemPlacement),
    /// The last unit was taken and the group's cells were released.
    Disposed { key: String, position: GridPos },
    /// No group of this key holds anything.
    NothingToRemove,
}

impl RemoveOutcome {
    pub fn is_removed(&self) -> bool {
        !matches!(self, RemoveOutcome::NothingToRemove)
    }
}

/// Position and contents of one placed group, as handed to observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub key: String,
    pub position: GridPos,
    pub size: Footprint,
    pub quantity: u32,
}

/// Raised after every repack attempt so a presentation layer can redraw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RepackEvent {
    /// Whether a new layout was committed to the grid.
    pub committed: bool,
    /// Every placed group after the attempt, in index order.
    pub groups: Vec<GroupSnapshot>,
}

/// Handle returned by [`Inventory::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type RepackListener = Box<dyn FnMut(&RepackEvent)>;

/// Grid inventory with stacking, first-fit placement and repacking.
pub struct Inventory {
    grid: Grid,
    groups: GroupArena,
    keys: KeyTable,
    /// Groups per key in insertion order, indexed by `KeyId`.
    index: Vec<Vec<GroupId>>,
    listeners: Vec<(SubscriptionId, RepackListener)>,
    next_subscription: u64,
    repack_on_overflow: bool,
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("dimensions", &self.grid.dimensions())
            .field("groups", &self.groups.len())
            .field("keys", &self.keys.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Inventory {
    /// Creates an empty inventory. Repacking on overflow defaults to enabled.
    pub fn new(dimensions: GridDimensions) -> Self {
        Self {
            grid: Grid::new(dimensions),
            groups: GroupArena::new(),
            keys: KeyTable::new(),
            index: Vec::new(),
            listeners: Vec::new(),
            next_subscription: 0,
            repack_on_overflow: true,
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        let mut inventory = Self::new(config.dimensions());
        inventory.repack_on_overflow = config.repack_on_overflow();
        inventory
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.grid.dimensions()
    }

    /// All placed groups in index order.
    pub fn groups(&self) -> impl Iterator<Item = &PlacedGroup> {
        self.index
            .iter()
            .flatten()
            .filter_map(|id| self.groups.get(*id))
    }

    /// Number of groups currently holding `key`.
    pub fn group_count(&self, key: &str) -> usize {
        self.keys
            .lookup(key)
            .map_or(0, |id| self.index.get(id.index()).map_or(0, Vec::len))
    }

    /// Total units of `key` across all groups.
    pub fn quantity(&self, key: &str) -> InventoryResult<u32> {
        let Some(id) = self.keys.lookup(key) else {
            return Ok(0);
        };
        let mut total = 0;
        for group in self.groups_of(id) {
            total += group.quantity(&self.grid)?;
        }
        Ok(total)
    }

    fn groups_of(&self, key: KeyId) -> impl Iterator<Item = &PlacedGroup> {
        self.index
            .get(key.index())
            .into_iter()
            .flatten()
            .filter_map(|id| self.groups.get(*id))
    }

    fn key_name(&self, key: KeyId) -> String {
        self.keys.name(key).unwrap_or_default().to_owned()
    }

    fn intern(&mut self, key: &str) -> KeyId {
        let id = self.keys.intern(key);
        if self.index.len() <= id.index() {
            self.index.resize_with(id.index() + 1, Vec::new);
        }
        id
    }

    /// Adds one unit using the configured repack policy.
    pub fn add_default(&mut self, item: &ItemDescriptor) -> InventoryResult<AddOutcome> {
        self.add(item, self.repack_on_overflow)
    }

    /// Adds one unit of `item`.
    ///
    /// Tries, in order: the first group of the same key with room, a block found
    /// by the grid search, and (if `allow_repack`) a full repack followed by a
    /// second search. A repack always notifies subscribers, whatever its result.
    pub fn add(&mut self, item: &ItemDescriptor, allow_repack: bool) -> InventoryResult<AddOutcome> {
        item.validate()?;
        let key = self.intern(&item.key);

        let outcome = self.add_unit(item, key, allow_repack);
        match &outcome {
            Ok(result) => {
                debug!("Add {} -> {:?}", item.key, result);
                self.log_matrix();
            }
            Err(err) => error!("Add {} aborted: {}", item.key, err),
        }
        outcome
    }

    fn add_unit(
        &mut self,
        item: &ItemDescriptor,
        key: KeyId,
        allow_repack: bool,
    ) -> InventoryResult<AddOutcome> {
        if self.grid.dimensions().units_per_cell(item.weight) == 0 {
            return Ok(AddOutcome::Rejected(RejectReason::TooHeavy));
        }
        if !item.fits_in(&self.grid.footprint()) {
            return Ok(AddOutcome::Rejected(RejectReason::ExceedsGrid));
        }

        if let Some(placement) = self.try_stack(key)? {
            return Ok(AddOutcome::Stacked(placement));
        }
        if let Some(outcome) = self.try_place(item, key)? {
            return Ok(outcome);
        }
        if !allow_repack {
            return Ok(AddOutcome::Rejected(RejectReason::NoSpace));
        }

        info!("No room for {}, repacking {} group(s)", item.key, self.groups.len());
        let committed = self.commit_repack()?;
        let outcome = if committed {
            match self.try_place(item, key)? {
                Some(AddOutcome::Placed(placement)) => AddOutcome::Repacked(placement),
                Some(other) => other,
                None => AddOutcome::Rejected(RejectReason::NoSpaceAfterRepack),
            }
        } else {
            AddOutcome::Rejected(RejectReason::RepackFailed)
        };
        self.notify(committed)?;
        Ok(outcome)
    }

    /// Step 1: the first group of `key` that can take one more unit.
    fn try_stack(&mut self, key: KeyId) -> InventoryResult<Option<ItemPlacement>> {
        let mut target = None;
        for group in self.groups_of(key) {
            if group.can_add(&self.grid, key, 1)? {
                target = Some(group.id());
                break;
            }
        }
        match target {
            Some(id) => self.add_to_group(id, key).map(Some),
            None => Ok(None),
        }
    }

    /// Step 2: ask the grid for a block and form a group there.
    fn try_place(&mut self, item: &ItemDescriptor, key: KeyId) -> InventoryResult<Option<AddOutcome>> {
        let Some(block) = self
            .grid
            .find_available_cells(item.size, item.weight, key)
        else {
            return Ok(None);
        };

        if let Some(owner) = block.occupant {
            // Only a whole group of the same key with room can absorb the unit.
            let group = self.group(owner)?;
            if group.key() == key
                && group.rect() == block.rect
                && group.can_add(&self.grid, key, 1)?
            {
                return self
                    .add_to_group(owner, key)
                    .map(|p| Some(AddOutcome::Stacked(p)));
            }
            warn!(
                "Block at {:?} belongs to {} and cannot take {}",
                block.rect.origin, owner, item.key
            );
            return Ok(None);
        }

        let id = self.create_group(item, key, block.rect)?;
        let placement = self.add_to_group(id, key)?;
        Ok(Some(AddOutcome::Placed(placement)))
    }

    fn create_group(&mut self, item: &ItemDescriptor, key: KeyId, rect: Rect) -> InventoryResult<GroupId> {
        let id = self.groups.next_id();
        let group = PlacedGroup::create(&mut self.grid, id, key, item.weight, rect)?;
        self.groups.insert(group);
        self.index[key.index()].push(id);
        debug!("Created {} for {} at {:?}", id, item.key, rect.origin);
        Ok(id)
    }

    fn add_to_group(&mut self, id: GroupId, key: KeyId) -> InventoryResult<ItemPlacement> {
        let group = self
            .groups
            .get(id)
            .ok_or(ConsistencyError::UnknownGroup(id))?;
        if !group.try_add(&mut self.grid, key, 1)? {
            return Err(ConsistencyError::NoRoom(id).into());
        }
        self.placement_of(id)
    }

    fn group(&self, id: GroupId) -> Result<&PlacedGroup, ConsistencyError> {
        self.groups.get(id).ok_or(ConsistencyError::UnknownGroup(id))
    }

    fn placement_of(&self, id: GroupId) -> InventoryResult<ItemPlacement> {
        let group = self.group(id)?;
        Ok(ItemPlacement {
            key: self.key_name(group.key()),
            group: id,
            position: group.position(),
            quantity: group.quantity(&self.grid)?,
        })
    }

    /// Removes one unit of `item`.
    ///
    /// Takes from the last group of the key that holds anything. A key with no
    /// groups is a no-op.
    pub fn remove(&mut self, item: &ItemDescriptor) -> InventoryResult<RemoveOutcome> {
        item.validate()?;
        let Some(key) = self.keys.lookup(&item.key) else {
            debug!("Nothing to remove for unknown key {}", item.key);
            return Ok(RemoveOutcome::NothingToRemove);
        };

        let outcome = self.remove_unit(key);
        match &outcome {
            Ok(RemoveOutcome::NothingToRemove) => {
                debug!("Cannot remove {}: no group holds it", item.key)
            }
            Ok(result) => {
                debug!("Remove {} -> {:?}", item.key, result);
                self.log_matrix();
            }
            Err(err) => error!("Remove {} aborted: {}", item.key, err),
        }
        outcome
    }

    fn remove_unit(&mut self, key: KeyId) -> InventoryResult<RemoveOutcome> {
        let mut target = None;
        for group in self.groups_of(key).collect::<Vec<_>>().into_iter().rev() {
            if group.can_remove(&self.grid, key, 1)? {
                target = Some(group.id());
                break;
            }
        }
        let Some(id) = target else {
            return Ok(RemoveOutcome::NothingToRemove);
        };

        let group = self
            .groups
            .get(id)
            .ok_or(ConsistencyError::UnknownGroup(id))?;
        let position = group.position();
        match group.try_remove(&mut self.grid, key, 1)? {
            GroupChange::Emptied => {
                self.index[key.index()].retain(|g| *g != id);
                self.groups.remove(id);
                debug!("Disposed {} at {:?}", id, position);
                Ok(RemoveOutcome::Disposed {
                    key: self.key_name(key),
                    position,
                })
            }
            GroupChange::Reduced => Ok(RemoveOutcome::Removed(self.placement_of(id)?)),
            GroupChange::Unchanged => Ok(RemoveOutcome::NothingToRemove),
        }
    }

    /// Repacks all groups now and notifies subscribers.
    ///
    /// Returns whether a new layout was committed.
    pub fn repack(&mut self) -> InventoryResult<bool> {
        let committed = self.commit_repack()?;
        self.notify(committed)?;
        self.log_matrix();
        Ok(committed)
    }

    /// Runs the packer and commits its layout only if every group was seated.
    fn commit_repack(&mut self) -> InventoryResult<bool> {
        let items: Vec<PackingItem> = self
            .groups()
            .map(|group| PackingItem {
                group: group.id(),
                size: group.footprint(),
            })
            .collect();

        let packer = Packer::new(self.grid.width(), self.grid.height());
        let outcome = packer.pack(&items);
        if !outcome.is_complete() {
            for unplaced in &outcome.unplaced {
                warn!(
                    "Repack could not seat {} ({}x{}): {}",
                    unplaced.item.group,
                    unplaced.item.size.width,
                    unplaced.item.size.height,
                    unplaced.reason
                );
            }
            return Ok(false);
        }

        self.grid
            .rebuild_from_layout(&outcome.placements, &mut self.groups)?;
        info!("Repack committed {} group(s)", outcome.placed_count());
        Ok(true)
    }

    /// Current position and contents of every group, in index order.
    pub fn snapshot(&self) -> InventoryResult<Vec<GroupSnapshot>> {
        self.groups()
            .map(|group| {
                Ok(GroupSnapshot {
                    key: self.key_name(group.key()),
                    position: group.position(),
                    size: group.footprint(),
                    quantity: group.quantity(&self.grid)?,
                })
            })
            .collect()
    }

    /// Registers a listener for repack events.
    pub fn subscribe(&mut self, listener: impl FnMut(&RepackEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, committed: bool) -> InventoryResult<()> {
        if self.listeners.is_empty() {
            return Ok(());
        }
        let event = RepackEvent {
            committed,
            groups: self.snapshot()?,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        Ok(())
    }

    /// Checks the capacity and group-consistency invariants over the whole grid.
    pub fn verify(&self) -> Result<(), ConsistencyError> {
        for group in self.groups() {
            // A zero-unit probe runs the full per-cell check.
            group.can_add(&self.grid, group.key(), 0)?;
        }
        for cell in self.grid.cells() {
            if cell.value() > cell.capacity() {
                return Err(ConsistencyError::Overfilled {
                    position: cell.position(),
                    capacity: cell.capacity(),
                    value: cell.value(),
                });
            }
            match cell.group() {
                Some(owner) => {
                    let group = self.group(owner)?;
                    if !group.rect().contains(cell.position()) {
                        return Err(ConsistencyError::ForeignCell {
                            group: owner,
                            position: cell.position(),
                            found: Some(owner),
                        });
                    }
                }
                None if cell.value() > 0 => {
                    return Err(ConsistencyError::OrphanFill {
                        position: cell.position(),
                        value: cell.value(),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }

    fn log_matrix(&self) {
        if log_enabled!(Level::Debug) {
            debug!("{}", self.grid.render_matrix());
        }
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::from_config(&InventoryConfig::default())
    }
}
