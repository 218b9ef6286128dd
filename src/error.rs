//! Error types for the inventory engine.
//!
//! Only genuine faults are errors. Running out of room is an ordinary outcome
//! and is reported through [`crate::inventory::AddOutcome`] and
//! [`crate::inventory::RemoveOutcome`] instead.

use thiserror::Error;

use crate::group::GroupId;
use crate::model::{KeyId, ValidationError};
use crate::types::GridPos;

/// Bookkeeping violation inside a placed group.
///
/// Any of these means the cells and the group index no longer agree; the
/// operation that detected it is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("cell {position:?} of group {group} holds item key {found:?}, expected {expected}")]
    KeyMismatch {
        group: GroupId,
        position: GridPos,
        expected: KeyId,
        found: Option<KeyId>,
    },
    #[error("cell {position:?} of group {group} holds fill {found}, head holds {expected}")]
    FillMismatch {
        group: GroupId,
        position: GridPos,
        expected: u32,
        found: u32,
    },
    #[error("cell {position:?} belongs to {found:?}, expected group {group}")]
    ForeignCell {
        group: GroupId,
        position: GridPos,
        found: Option<GroupId>,
    },
    #[error("group {0} is not registered")]
    UnknownGroup(GroupId),
    #[error("group {0} had no room for a unit it was chosen to hold")]
    NoRoom(GroupId),
    #[error("cell {position:?} holds {value} units, capacity is {capacity}")]
    Overfilled {
        position: GridPos,
        capacity: u32,
        value: u32,
    },
    #[error("cell {position:?} holds {value} units but belongs to no group")]
    OrphanFill { position: GridPos, value: u32 },
    #[error("position {position:?} lies outside the {width}x{height} grid")]
    OutOfBounds {
        position: GridPos,
        width: usize,
        height: usize,
    },
}

/// Top-level error returned by [`crate::inventory::Inventory`].
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("inventory consistency violated: {0}")]
    Consistency(#[from] ConsistencyError),
    #[error("could not load configuration: {0}")]
    Config(#[from] dotenvy::Error),
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;
