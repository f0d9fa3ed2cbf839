//! Error types for ROSTER operations

use crate::{EntityId, EntityKind};
use thiserror::Error;

/// Storage layer errors.
///
/// The cache never interprets these; they are propagated unchanged from
/// write paths and logged on the reconciliation path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind:?} with id {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("Insert failed for {kind:?}: {reason}")]
    InsertFailed { kind: EntityKind, reason: String },

    #[error("Load failed for {kind:?}: {reason}")]
    LoadFailed { kind: EntityKind, reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cycle in {kind:?} hierarchy: {ids:?}")]
    HierarchyCycle { kind: EntityKind, ids: Vec<EntityId> },

    #[error("Negative {kind:?} id: {value}")]
    NegativeId { kind: EntityKind, value: EntityId },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ROSTER errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl RosterError {
    /// Whether this error is a rejected hierarchy cycle.
    pub fn is_hierarchy_cycle(&self) -> bool {
        matches!(
            self,
            RosterError::Validation(ValidationError::HierarchyCycle { .. })
        )
    }
}

/// Result type alias for ROSTER operations.
pub type RosterResult<T> = Result<T, RosterError>;

// =============================================================================
// TESTS
// =============================================================================
