//! Cacheable entity traits and cache statistics.
//!
//! This module defines what an entity must provide to be mirrored by a
//! [`super::CacheManager`], and the counters the cache exposes.

use roster_core::{Device, EntityId, EntityIdType, EntityKind, Group};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker trait for types that can be cached.
///
/// # Implementation Requirements
///
/// - `kind()` must return a consistent value for all instances
/// - `entity_id()` must return the unique, immutable identifier for this instance
/// - Implementations must be `Send + Sync + 'static` so caches can be shared across threads
pub trait CachedEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Get the entity kind for this cacheable.
    fn kind() -> EntityKind;

    /// Get the unique identifier for this entity.
    fn entity_id(&self) -> EntityId;
}

/// An entity that references a parent of the same kind.
///
/// `None` terminates any parent-chain walk.
pub trait HierarchicalEntity: CachedEntity {
    /// Identifier of the parent entity, if any.
    fn parent_entity_id(&self) -> Option<EntityId>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of `get_by_id` hits.
    pub hits: u64,
    /// Number of `get_by_id` misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of completed reconciliations.
    pub refreshes: u64,
    /// Number of reconciliations abandoned because the store failed.
    pub refresh_failures: u64,
    /// Number of loaded entities a validation hook refused during reconciliation.
    pub rejected: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Live counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct AtomicCacheStats {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) refreshes: AtomicU64,
    pub(crate) refresh_failures: AtomicU64,
    pub(crate) rejected: AtomicU64,
}

impl AtomicCacheStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// IMPLEMENTATIONS FOR ROSTER ENTITIES
// ============================================================================

impl CachedEntity for Group {
    fn kind() -> EntityKind {
        EntityKind::Group
    }

    fn entity_id(&self) -> EntityId {
        self.id.as_i64()
    }
}

impl HierarchicalEntity for Group {
    fn parent_entity_id(&self) -> Option<EntityId> {
        self.parent_id.map(|id| id.as_i64())
    }
}

impl CachedEntity for Device {
    fn kind() -> EntityKind {
        EntityKind::Device
    }

    fn entity_id(&self) -> EntityId {
        self.id.as_i64()
    }
}
