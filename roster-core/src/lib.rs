//! ROSTER Core - Entity Types
//!
//! Pure data structures with no caching behaviour. All other crates depend on this.
//! This crate contains identifiers, entities, errors and configuration only.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::{CacheSettings, DEFAULT_REFRESH_DELAY_MS, REFRESH_DELAY_ENV};
pub use entities::{Attributes, Device, EntityKind, Group};
pub use error::{ConfigError, RosterError, RosterResult, StorageError, ValidationError};
pub use identity::{
    now_millis, DeviceId, DurationMs, EntityId, EntityIdType, GroupId, UserId,
};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
