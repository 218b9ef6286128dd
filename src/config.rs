use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use log::{info, warn};

use crate::error::InventoryResult;
use crate::model::GridDimensions;

/// Inventory configuration, loaded from environment variables, a `.env` file or default values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InventoryConfig {
    dimensions: GridDimensions,
    repack_on_overflow: bool,
}

impl InventoryConfig {
    pub const WIDTH_VAR: &'static str = "GRID_INVENTORY_WIDTH";
    pub const HEIGHT_VAR: &'static str = "GRID_INVENTORY_HEIGHT";
    pub const CELL_CAPACITY_VAR: &'static str = "GRID_INVENTORY_CELL_CAPACITY";
    pub const REPACK_VAR: &'static str = "GRID_INVENTORY_REPACK";

    pub const DEFAULT_REPACK_ON_OVERFLOW: bool = true;

    pub fn new(dimensions: GridDimensions, repack_on_overflow: bool) -> Self {
        Self {
            dimensions,
            repack_on_overflow,
        }
    }

    /// Loads `.env` from the working directory if present, then reads the process environment.
    ///
    /// A missing `.env` is silently ignored; an unreadable one is logged and skipped.
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
            {
                warn!("Could not load .env: {}", err);
            }
        }
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(err) => {
                warn!("Access to {} failed: {}. Using default value.", name, err);
                None
            }
        })
    }

    /// Reads the configuration from a dotenv-style file without touching the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let mut values = HashMap::new();
        for entry in dotenvy::from_path_iter(path.as_ref())? {
            let (name, value) = entry?;
            values.insert(name, value);
        }
        info!(
            "Loaded {} variable(s) from {}",
            values.len(),
            path.as_ref().display()
        );
        Ok(Self::from_lookup(|name| values.get(name).cloned()))
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Blank, unparsable or non-positive values fall back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let width = load_with_warning(
            &lookup,
            Self::WIDTH_VAR,
            GridDimensions::DEFAULT_WIDTH,
            |value| value > 0,
            "must be greater than 0",
        );
        let height = load_with_warning(
            &lookup,
            Self::HEIGHT_VAR,
            GridDimensions::DEFAULT_HEIGHT,
            |value| value > 0,
            "must be greater than 0",
        );
        let cell_capacity = load_with_warning(
            &lookup,
            Self::CELL_CAPACITY_VAR,
            GridDimensions::DEFAULT_CELL_CAPACITY,
            |value| value > 0,
            "must be greater than 0",
        );
        let repack_on_overflow = lookup_string(&lookup, Self::REPACK_VAR)
            .and_then(|raw| parse_bool(&raw, Self::REPACK_VAR))
            .unwrap_or(Self::DEFAULT_REPACK_ON_OVERFLOW);

        let dimensions = GridDimensions::new(width, height, cell_capacity).unwrap_or_else(|err| {
            warn!("{}. Using the default grid.", err);
            GridDimensions::default()
        });

        Self {
            dimensions,
            repack_on_overflow,
        }
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Whether `Inventory::add_default` may repack when no block is free.
    pub fn repack_on_overflow(&self) -> bool {
        self.repack_on_overflow
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self::new(GridDimensions::default(), Self::DEFAULT_REPACK_ON_OVERFLOW)
    }
}

fn lookup_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    let value = lookup(name)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_with_warning<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + Display,
    T::Err: Display,
{
    match lookup_string(lookup, var_name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
