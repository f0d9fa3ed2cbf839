//! Cache for entities organised as a parent hierarchy.
//!
//! Adds two things on top of [`CacheManager`]:
//!
//! - every insert and update is checked for parent cycles before anything
//!   is written, so the cached hierarchy stays a forest;
//! - refreshes go through a [`RefreshThrottle`], and reading the id set of
//!   an empty cache forces one refresh so the cache recovers on its own
//!   after a cold start or a store outage.
//!
//! Inserts, updates and refreshes are serialized by a write lock held from
//! the cycle check until the cache is updated, so two concurrent writers
//! cannot each pass the check and together close a cycle. Reads never take
//! the lock.
//!
//! Cycle checks only see the cache. A parent that exists in the store but
//! is not cached yet ends the walk as if it were absent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roster_core::{
    CacheSettings, EntityId, RosterError, RosterResult, StorageError, UserId, ValidationError,
};

use super::manager::{CacheManager, MutationHook, MutationHooks};
use super::throttle::RefreshThrottle;
use super::traits::{CacheStats, HierarchicalEntity};
use crate::permissions::{ManagedObjects, PermissionSource, UserSource};
use crate::ObjectStore;

/// Reject `candidate` if following parent links from it revisits an id.
///
/// The candidate's own id resolves to the candidate rather than to any
/// cached copy, so the walk sees the hierarchy as it would be after the
/// mutation. The walk ends at an entity without a parent or at a parent
/// that is not cached.
pub fn check_cycles<T: HierarchicalEntity>(
    cache: &CacheManager<T>,
    candidate: &T,
) -> RosterResult<()> {
    let mut visited = HashSet::new();
    let mut chain = vec![candidate.entity_id()];
    visited.insert(candidate.entity_id());

    let mut next = candidate.parent_entity_id();
    while let Some(id) = next {
        if visited.contains(&id) {
            chain.push(id);
            return Err(RosterError::Validation(ValidationError::HierarchyCycle {
                kind: T::kind(),
                ids: chain,
            }));
        }
        let Some(parent) = cache.peek(id) else {
            break;
        };
        visited.insert(id);
        chain.push(id);
        next = parent.parent_entity_id();
    }
    Ok(())
}

/// [`CacheManager`] for hierarchical entities, with cycle prevention,
/// throttled refresh and permission composition.
pub struct HierarchicalCacheManager<T: HierarchicalEntity> {
    cache: CacheManager<T>,
    throttle: RefreshThrottle,
    /// Held across check, store write and cache update.
    writes: Mutex<()>,
    permissions: Option<Arc<dyn PermissionSource>>,
    users: Option<Arc<dyn UserSource>>,
}

impl<T: HierarchicalEntity> HierarchicalCacheManager<T> {
    /// Create the cache and, if a store is given, populate it.
    ///
    /// The initial population does not start the throttle window, so the
    /// first conditional [`refresh`](Self::refresh) always runs.
    pub fn new(store: Option<Arc<dyn ObjectStore<T>>>, settings: &CacheSettings) -> Self {
        let hook: MutationHook<T> = Arc::new(check_cycles::<T>);
        Self {
            cache: CacheManager::with_hooks(store, MutationHooks::on_write(hook)),
            throttle: RefreshThrottle::from_settings(settings),
            writes: Mutex::new(()),
            permissions: None,
            users: None,
        }
    }

    /// Attach the permission collaborator.
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionSource>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Attach the user-management collaborator.
    pub fn with_users(mut self, users: Arc<dyn UserSource>) -> Self {
        self.users = Some(users);
        self
    }

    /// The underlying cache.
    pub fn cache(&self) -> &CacheManager<T> {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Refresh through the throttle. Returns whether this call refreshed.
    ///
    /// Callers that are not admitted return immediately and keep using the
    /// current contents; the admitted caller's refresh covers them.
    pub fn refresh(&self, force: bool) -> bool {
        if !self.throttle.try_acquire(force) {
            tracing::debug!(kind = ?T::kind(), force, "Skipping throttled refresh");
            return false;
        }
        self.refresh_all();
        true
    }

    /// Unthrottled reconciliation with the store.
    pub fn refresh_all(&self) {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.cache.refresh_all();
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_by_id(&self, id: EntityId) -> Option<Arc<T>> {
        self.cache.get_by_id(id)
    }

    /// Current set of cached ids, forcing one refresh first if it is empty.
    pub fn get_all_ids(&self) -> HashSet<EntityId> {
        let ids = self.cache.get_all_ids();
        if !ids.is_empty() {
            return ids;
        }
        tracing::info!(kind = ?T::kind(), "Cache empty, forcing refresh");
        self.refresh(true);
        self.cache.get_all_ids()
    }

    pub fn get_items(&self, ids: impl IntoIterator<Item = EntityId>) -> Vec<Arc<T>> {
        self.cache.get_items(ids)
    }

    /// Parent chain of a cached entity, nearest first.
    ///
    /// Stops at a root or at a parent that is not cached.
    pub fn ancestors(&self, id: EntityId) -> Vec<Arc<T>> {
        let mut result = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut next = self.cache.peek(id).and_then(|entity| entity.parent_entity_id());
        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.cache.peek(parent_id) else {
                break;
            };
            next = parent.parent_entity_id();
            result.push(parent);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Add an entity; fails with a hierarchy cycle before touching the store.
    pub fn add_item(&self, entity: T) -> RosterResult<()> {
        let _guard = self.write_guard()?;
        self.cache.add_item(entity)
    }

    /// Update an entity; fails with a hierarchy cycle before touching the store.
    pub fn update_item(&self, entity: T) -> RosterResult<()> {
        let _guard = self.write_guard()?;
        self.cache.update_item(entity)
    }

    pub fn remove_item(&self, id: EntityId) -> RosterResult<()> {
        self.cache.remove_item(id)
    }

    fn write_guard(&self) -> RosterResult<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| RosterError::Storage(StorageError::LockPoisoned))
    }
}

impl<T: HierarchicalEntity> ManagedObjects for HierarchicalCacheManager<T> {
    fn get_user_items(&self, user_id: UserId) -> HashSet<EntityId> {
        self.permissions
            .as_ref()
            .map(|permissions| permissions.group_permissions(user_id))
            .unwrap_or_default()
    }

    fn get_managed_items(&self, user_id: UserId) -> HashSet<EntityId> {
        let mut result = self.get_user_items(user_id);
        if let Some(users) = &self.users {
            for managed in users.users_managed_by(user_id) {
                result.extend(self.get_user_items(managed));
            }
        }
        result
    }
}
