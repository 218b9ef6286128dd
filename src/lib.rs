//! Grid inventory engine.
//!
//! Items with a rectangular footprint are stored in a fixed grid of capacity
//! cells. Adding a unit first stacks it onto an existing group of the same
//! item, then looks for a free block, and finally (when allowed) repacks every
//! placed group with a shelf-packing heuristic to make room.
//!
//! ```
//! use grid_inventory::{AddOutcome, GridDimensions, Inventory, ItemDescriptor};
//!
//! let mut inventory = Inventory::new(GridDimensions::new(4, 4, 2).unwrap());
//! let ore = ItemDescriptor::new("ore", (2, 1), 1).unwrap();
//!
//! assert!(matches!(inventory.add(&ore, true).unwrap(), AddOutcome::Placed(_)));
//! assert!(matches!(inventory.add(&ore, true).unwrap(), AddOutcome::Stacked(_)));
//! assert_eq!(inventory.quantity("ore").unwrap(), 2);
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod group;
pub mod inventory;
pub mod model;
pub mod packer;
pub mod types;

pub use config::InventoryConfig;
pub use error::{ConsistencyError, InventoryError, InventoryResult};
pub use inventory::{
    AddOutcome, GroupSnapshot, Inventory, ItemPlacement, RejectReason, RemoveOutcome,
    RepackEvent, SubscriptionId,
};
pub use model::{GridDimensions, ItemDescriptor, ValidationError};
pub use types::{Footprint, GridPos};
