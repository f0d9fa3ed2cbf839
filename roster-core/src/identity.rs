//! Identity types for ROSTER entities

use crate::{EntityKind, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw entity identifier as persisted by the store.
/// Identifiers are non-negative and unique per entity kind.
pub type EntityId = i64;

/// Duration in milliseconds for refresh intervals.
pub type DurationMs = i64;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> DurationMs {
    Utc::now().timestamp_millis()
}

/// Common behaviour of the strongly-typed entity identifiers.
///
/// Each id type is bound to exactly one [`EntityKind`], so a `GroupId` can
/// never be passed where a `UserId` is expected.
pub trait EntityIdType:
    Copy + Eq + Ord + std::hash::Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// The entity kind this id refers to.
    const KIND: EntityKind;

    /// Wrap a raw identifier without checking it.
    fn new(value: EntityId) -> Self;

    /// The raw identifier.
    fn as_i64(&self) -> EntityId;

    /// Wrap a raw identifier, rejecting negative values.
    fn try_new(value: EntityId) -> Result<Self, ValidationError> {
        if value < 0 {
            return Err(ValidationError::NegativeId {
                kind: Self::KIND,
                value,
            });
        }
        Ok(Self::new(value))
    }

    /// The entity kind this id refers to.
    fn kind(&self) -> EntityKind {
        Self::KIND
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(EntityId);

        impl EntityIdType for $name {
            const KIND: EntityKind = $kind;

            fn new(value: EntityId) -> Self {
                Self(value)
            }

            fn as_i64(&self) -> EntityId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for EntityId {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a [`crate::Group`].
    GroupId,
    EntityKind::Group
);
define_entity_id!(
    /// Identifier of a [`crate::Device`].
    DeviceId,
    EntityKind::Device
);
define_entity_id!(
    /// Identifier of a user known to the user-management subsystem.
    UserId,
    EntityKind::User
);
