//! Error types for the combat model.

use thiserror::Error;

use crate::data::{UnitTypeId, Upgrade};

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for catalog, prediction and search errors.
#[derive(Debug, Error)]
pub enum CombatError {
    /// A unit name that the catalog does not know.
    #[error("Unknown unit type: {0}")]
    UnknownUnitName(String),

    /// A unit-type index outside the catalog.
    #[error("Unit type index {0} is outside the catalog")]
    UnknownUnitType(UnitTypeId),

    /// An upgrade without cost data in the catalog.
    #[error("No catalog data for upgrade {0:?}")]
    MissingUpgradeData(Upgrade),

    /// Owner ids must be 1 or 2.
    #[error("Invalid owner id: {0} (expected 1 or 2)")]
    InvalidOwner(u8),

    /// Catalog text could not be parsed.
    #[error("Failed to parse catalog: {message}")]
    CatalogParse {
        /// Parser error message.
        message: String,
    },

    /// Catalog parsed but is internally inconsistent.
    #[error("Invalid catalog entry '{unit}': {message}")]
    InvalidCatalog {
        /// Offending unit (or upgrade) name.
        unit: String,
        /// What is wrong with it.
        message: String,
    },

    /// Composition search was configured inconsistently.
    #[error("Invalid optimizer setup: {0}")]
    OptimizerSetup(String),

    /// Invalid combat state.
    #[error("Invalid combat state: {0}")]
    InvalidState(String),
}
