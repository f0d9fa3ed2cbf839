//! ROSTER Storage - Store Trait, Mock Store and Entity Caches
//!
//! Defines the persistence abstraction the caches write through to, an
//! in-memory mock of it, and the cache managers themselves.
//! Real (SQL or otherwise) stores live outside this crate.

pub mod cache;
pub mod permissions;

pub use cache::{
    check_cycles, CacheManager, CacheStats, CachedEntity, HierarchicalCacheManager,
    HierarchicalEntity, MutationHook, MutationHooks, RefreshThrottle,
};
pub use permissions::{ManagedObjects, MockPermissions, MockUsers, PermissionSource, UserSource};

use roster_core::{EntityId, EntityKind, RosterError, RosterResult, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Persistence collaborator for one entity type.
///
/// Errors are opaque to the caches: write-path errors are returned to the
/// caller unchanged and load errors are logged by the reconciliation pass.
/// Calls block until the store responds; timeouts are the store's concern.
pub trait ObjectStore<T: CachedEntity>: Send + Sync {
    /// Load every persisted entity of `kind`.
    fn load_all(&self, kind: EntityKind) -> RosterResult<Vec<T>>;

    /// Persist a new entity.
    fn insert(&self, entity: &T) -> RosterResult<()>;

    /// Replace a persisted entity wholesale.
    fn replace(&self, entity: &T) -> RosterResult<()>;

    /// Delete a persisted entity.
    fn delete(&self, kind: EntityKind, id: EntityId) -> RosterResult<()>;
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// In-memory store for testing and embedding.
///
/// Counts every call so tests can assert how often the caches reach the
/// store, and can be switched into a failing mode to simulate an outage.
#[derive(Debug)]
pub struct MockStore<T> {
    items: RwLock<HashMap<EntityId, T>>,
    failing: AtomicBool,
    load_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    replace_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl<T> Default for MockStore<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
            load_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            replace_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }
}

impl<T: CachedEntity> MockStore<T> {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store pre-populated with `items`.
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new();
        store.seed_all(items);
        store
    }

    /// Put an entity straight into the store, bypassing any cache.
    pub fn seed(&self, entity: T) {
        if let Ok(mut items) = self.items.write() {
            items.insert(entity.entity_id(), entity);
        }
    }

    /// Put several entities straight into the store.
    pub fn seed_all(&self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.seed(entity);
        }
    }

    /// Remove an entity straight from the store, bypassing any cache.
    pub fn remove_direct(&self, id: EntityId) -> Option<T> {
        self.items.write().ok().and_then(|mut items| items.remove(&id))
    }

    /// Look up a persisted entity.
    pub fn get(&self, id: EntityId) -> Option<T> {
        self.items
            .read()
            .ok()
            .and_then(|items| items.get(&id).cloned())
    }

    /// Number of persisted entities.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail with [`StorageError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> RosterResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RosterError::Storage(StorageError::Unavailable {
                reason: "mock store set to fail".to_string(),
            }));
        }
        Ok(())
    }
}

impl<T: CachedEntity> ObjectStore<T> for MockStore<T> {
    fn load_all(&self, kind: EntityKind) -> RosterResult<Vec<T>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if kind != T::kind() {
            return Err(RosterError::Storage(StorageError::LoadFailed {
                kind,
                reason: format!("store holds {:?} entities", T::kind()),
            }));
        }
        let items = self.items.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<T> = items.values().cloned().collect();
        result.sort_by_key(|item| item.entity_id());
        Ok(result)
    }

    fn insert(&self, entity: &T) -> RosterResult<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        if items.contains_key(&entity.entity_id()) {
            return Err(RosterError::Storage(StorageError::InsertFailed {
                kind: T::kind(),
                reason: "already exists".to_string(),
            }));
        }
        items.insert(entity.entity_id(), entity.clone());
        Ok(())
    }

    fn replace(&self, entity: &T) -> RosterResult<()> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        let slot = items.get_mut(&entity.entity_id()).ok_or(RosterError::Storage(
            StorageError::NotFound {
                kind: T::kind(),
                id: entity.entity_id(),
            },
        ))?;
        *slot = entity.clone();
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: EntityId) -> RosterResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        items
            .remove(&id)
            .map(|_| ())
            .ok_or(RosterError::Storage(StorageError::NotFound { kind, id }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
