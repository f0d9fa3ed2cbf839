//! Write-through cache mirroring one entity kind.
//!
//! The cache holds the whole collection. Reads never touch the store;
//! writes reach the store first and are mirrored only once the store has
//! accepted them. [`CacheManager::refresh_all`] re-derives the complete live
//! set from the store, which is how deletions made behind the cache's back
//! are detected.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use roster_core::{EntityId, RosterResult};

use super::traits::{AtomicCacheStats, CacheStats, CachedEntity};
use crate::ObjectStore;

/// Pre-mutation validator.
///
/// Receives the cache as it is before the mutation and the candidate
/// entity. Returning an error rejects the mutation before anything is
/// written.
pub type MutationHook<T> = Arc<dyn Fn(&CacheManager<T>, &T) -> RosterResult<()> + Send + Sync>;

/// Optional validators run before inserts and updates.
pub struct MutationHooks<T: CachedEntity> {
    pub on_insert: Option<MutationHook<T>>,
    pub on_update: Option<MutationHook<T>>,
}

impl<T: CachedEntity> Default for MutationHooks<T> {
    fn default() -> Self {
        Self {
            on_insert: None,
            on_update: None,
        }
    }
}

impl<T: CachedEntity> Clone for MutationHooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_insert: self.on_insert.clone(),
            on_update: self.on_update.clone(),
        }
    }
}

impl<T: CachedEntity> MutationHooks<T> {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` before inserts.
    pub fn with_insert(mut self, hook: MutationHook<T>) -> Self {
        self.on_insert = Some(hook);
        self
    }

    /// Run the same `hook` before inserts and updates.
    pub fn on_write(hook: MutationHook<T>) -> Self {
        Self {
            on_insert: Some(hook.clone()),
            on_update: Some(hook),
        }
    }
}

/// In-memory mirror of one entity kind with store-backed CRUD.
///
/// Values are stored as `Arc<T>`, so replacing an entry swaps the whole
/// value and readers see either the old or the new entity.
pub struct CacheManager<T: CachedEntity> {
    store: Option<Arc<dyn ObjectStore<T>>>,
    items: DashMap<EntityId, Arc<T>>,
    hooks: MutationHooks<T>,
    stats: AtomicCacheStats,
}

impl<T: CachedEntity> CacheManager<T> {
    /// Create a cache without hooks.
    ///
    /// With a store the cache is populated immediately; without one it
    /// starts empty and only holds what is added through it.
    pub fn new(store: Option<Arc<dyn ObjectStore<T>>>) -> Self {
        Self::with_hooks(store, MutationHooks::default())
    }

    /// Create a cache whose inserts and updates are validated by `hooks`.
    ///
    /// The initial population already runs through the hooks.
    pub fn with_hooks(store: Option<Arc<dyn ObjectStore<T>>>, hooks: MutationHooks<T>) -> Self {
        let manager = Self {
            store,
            items: DashMap::new(),
            hooks,
            stats: AtomicCacheStats::default(),
        };
        manager.refresh_all();
        manager
    }

    /// Whether a backing store is configured.
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Look up a cached entity.
    ///
    /// Bumps the hit or miss counter in [`stats`](Self::stats); nothing
    /// else is changed.
    pub fn get_by_id(&self, id: EntityId) -> Option<Arc<T>> {
        let found = self.peek(id);
        if found.is_some() {
            AtomicCacheStats::bump(&self.stats.hits);
        } else {
            AtomicCacheStats::bump(&self.stats.misses);
        }
        found
    }

    /// Current set of cached ids.
    pub fn get_all_ids(&self) -> HashSet<EntityId> {
        self.items.iter().map(|entry| *entry.key()).collect()
    }

    /// Cached entities for `ids`, skipping ids that are not cached.
    pub fn get_items(&self, ids: impl IntoIterator<Item = EntityId>) -> Vec<Arc<T>> {
        ids.into_iter()
            .filter_map(|id| self.peek(id))
            .collect()
    }

    /// Look up a cached entity without counting a hit or miss.
    pub(crate) fn peek(&self, id: EntityId) -> Option<Arc<T>> {
        self.items.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is cached.
    pub fn contains(&self, id: EntityId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.items.len())
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Reconcile the cache with the full contents of the store.
    ///
    /// Loaded entities replace or join the cached ones; cached ids missing
    /// from the load are dropped. A store failure abandons the pass and
    /// leaves the cache as it was. Loaded entities refused by a hook are
    /// skipped, keeping any previously cached version.
    ///
    /// An entity added through this cache after the load but before the
    /// stale sweep is evicted by the sweep even though the store holds it.
    /// The next refresh brings it back.
    pub fn refresh_all(&self) {
        let Some(store) = &self.store else {
            return;
        };

        tracing::debug!(kind = ?T::kind(), "Reconciling cache with store");

        let loaded = match store.load_all(T::kind()) {
            Ok(loaded) => loaded,
            Err(error) => {
                AtomicCacheStats::bump(&self.stats.refresh_failures);
                tracing::warn!(kind = ?T::kind(), error = %error, "Cache refresh failed, keeping cached entities");
                return;
            }
        };

        let mut live = HashSet::with_capacity(loaded.len());
        let (mut inserted, mut updated, mut rejected) = (0usize, 0usize, 0usize);

        for item in loaded {
            let id = item.entity_id();
            live.insert(id);
            let is_update = self.items.contains_key(&id);
            let check = if is_update {
                self.check_update(&item)
            } else {
                self.check_insert(&item)
            };
            if let Err(error) = check {
                rejected += 1;
                AtomicCacheStats::bump(&self.stats.rejected);
                tracing::warn!(kind = ?T::kind(), id, error = %error, "Skipping entity rejected during refresh");
                continue;
            }
            self.put(item);
            if is_update {
                updated += 1;
            } else {
                inserted += 1;
            }
        }

        let stale: Vec<EntityId> = self
            .items
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| !live.contains(id))
            .collect();
        for id in &stale {
            self.items.remove(id);
        }

        AtomicCacheStats::bump(&self.stats.refreshes);
        tracing::debug!(
            kind = ?T::kind(),
            loaded = live.len(),
            inserted,
            updated,
            removed = stale.len(),
            rejected,
            "Cache reconciled"
        );
    }

    // ------------------------------------------------------------------
    // Write-through CRUD
    // ------------------------------------------------------------------

    /// Persist a new entity, then cache it.
    ///
    /// The insert hook runs first; on any error neither store nor cache
    /// is touched past the failing step.
    pub fn add_item(&self, entity: T) -> RosterResult<()> {
        self.check_insert(&entity)?;
        if let Some(store) = &self.store {
            store.insert(&entity)?;
        }
        self.put(entity);
        Ok(())
    }

    /// Persist a replacement entity, then swap the cached value.
    pub fn update_item(&self, entity: T) -> RosterResult<()> {
        self.check_update(&entity)?;
        if let Some(store) = &self.store {
            store.replace(&entity)?;
        }
        self.put(entity);
        Ok(())
    }

    /// Delete an entity from the store, then from the cache.
    ///
    /// Ids that are not cached are ignored without calling the store.
    pub fn remove_item(&self, id: EntityId) -> RosterResult<()> {
        if !self.items.contains_key(&id) {
            return Ok(());
        }
        if let Some(store) = &self.store {
            store.delete(T::kind(), id)?;
        }
        self.items.remove(&id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    fn check_insert(&self, entity: &T) -> RosterResult<()> {
        match &self.hooks.on_insert {
            Some(hook) => hook(self, entity),
            None => Ok(()),
        }
    }

    fn check_update(&self, entity: &T) -> RosterResult<()> {
        match &self.hooks.on_update {
            Some(hook) => hook(self, entity),
            None => Ok(()),
        }
    }

    fn put(&self, entity: T) {
        self.items.insert(entity.entity_id(), Arc::new(entity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockStore;
    use roster_core::{
        Device, DeviceId, EntityIdType, EntityKind, RosterError, StorageError, ValidationError,
    };

    fn make_device(id: i64) -> Device {
        Device::new(DeviceId::new(id), format!("Device {}", id), format!("imei-{}", id))
    }

    fn setup(ids: &[i64]) -> (Arc<MockStore<Device>>, CacheManager<Device>) {
        let store = Arc::new(MockStore::with_items(ids.iter().map(|id| make_device(*id))));
        let cache = CacheManager::new(Some(store.clone() as Arc<dyn ObjectStore<Device>>));
        (store, cache)
    }

    fn ids(set: &[i64]) -> HashSet<EntityId> {
        set.iter().copied().collect()
    }

    // ========================================================================
    // Construction and reads
    // ========================================================================

    #[test]
    fn test_eager_population_with_store() {
        let (store, cache) = setup(&[1, 2, 3]);
        assert_eq!(store.load_calls(), 1);
        assert_eq!(cache.get_all_ids(), ids(&[1, 2, 3]));
        assert_eq!(cache.get_by_id(2).unwrap().name, "Device 2");
    }

    #[test]
    fn test_without_store_starts_empty_and_caches_writes() {
        let cache: CacheManager<Device> = CacheManager::new(None);
        assert!(cache.is_empty());
        assert!(!cache.has_store());

        cache.add_item(make_device(5)).unwrap();
        assert!(cache.contains(5));

        cache.refresh_all();
        assert_eq!(cache.get_all_ids(), ids(&[5]));

        cache.remove_item(5).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_items_skips_missing() {
        let (_store, cache) = setup(&[1, 2]);
        let found = cache.get_items([1, 7, 2, 9]);
        let found_ids: Vec<i64> = found.iter().map(|d| d.entity_id()).collect();
        assert_eq!(found_ids, vec![1, 2]);
        assert!(cache.get_items(Vec::new()).is_empty());
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let (_store, cache) = setup(&[1]);
        cache.get_by_id(1);
        cache.get_by_id(1);
        cache.get_by_id(3);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.refreshes, 1);
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    #[test]
    fn test_refresh_picks_up_inserts_updates_and_deletions() {
        let (store, cache) = setup(&[1, 2, 3]);

        store.remove_direct(2);
        store.seed(make_device(4));
        let mut renamed = make_device(1);
        renamed.name = "Renamed".to_string();
        store.seed(renamed);

        cache.refresh_all();

        assert_eq!(cache.get_all_ids(), ids(&[1, 3, 4]));
        assert_eq!(cache.get_by_id(1).unwrap().name, "Renamed");
        assert!(cache.get_by_id(2).is_none());
    }

    #[test]
    fn test_refresh_with_empty_store_clears_cache() {
        let (store, cache) = setup(&[1, 2]);
        store.remove_direct(1);
        store.remove_direct(2);
        cache.refresh_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_refresh_failure_keeps_previous_contents() {
        let (store, cache) = setup(&[1, 2]);
        store.remove_direct(1);
        store.set_failing(true);

        cache.refresh_all();

        assert_eq!(cache.get_all_ids(), ids(&[1, 2]));
        assert_eq!(cache.stats().refresh_failures, 1);
    }

    #[test]
    fn test_refresh_skips_rejected_entities() {
        let store = Arc::new(MockStore::with_items([make_device(1), make_device(13)]));
        let hook: MutationHook<Device> = Arc::new(|_: &CacheManager<Device>, device: &Device| {
            if device.entity_id() == 13 {
                Err(RosterError::Validation(ValidationError::NegativeId {
                    kind: EntityKind::Device,
                    value: -13,
                }))
            } else {
                Ok(())
            }
        });
        let cache = CacheManager::with_hooks(
            Some(store as Arc<dyn ObjectStore<Device>>),
            MutationHooks::on_write(hook),
        );

        assert_eq!(cache.get_all_ids(), ids(&[1]));
        assert_eq!(cache.stats().rejected, 1);
    }

    // ========================================================================
    // Write-through CRUD
    // ========================================================================

    #[test]
    fn test_add_then_get_then_remove() {
        let (store, cache) = setup(&[1]);
        cache.add_item(make_device(2)).unwrap();
        assert_eq!(cache.get_by_id(2).unwrap().entity_id(), 2);
        assert!(store.get(2).is_some());

        cache.remove_item(2).unwrap();
        assert!(cache.get_by_id(2).is_none());
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_update_replaces_cached_value() {
        let (store, cache) = setup(&[1]);
        let before = cache.get_by_id(1).unwrap();

        let mut renamed = make_device(1);
        renamed.name = "Renamed".to_string();
        cache.update_item(renamed).unwrap();

        assert_eq!(cache.get_by_id(1).unwrap().name, "Renamed");
        assert_eq!(store.get(1).unwrap().name, "Renamed");
        // Readers holding the old value keep a complete old entity.
        assert_eq!(before.name, "Device 1");
    }

    #[test]
    fn test_store_failure_leaves_cache_unchanged() {
        let (store, cache) = setup(&[1]);
        store.set_failing(true);

        let add = cache.add_item(make_device(2));
        assert!(matches!(
            add,
            Err(RosterError::Storage(StorageError::Unavailable { .. }))
        ));

        let mut renamed = make_device(1);
        renamed.name = "Renamed".to_string();
        assert!(cache.update_item(renamed).is_err());

        assert!(cache.remove_item(1).is_err());

        assert_eq!(cache.get_all_ids(), ids(&[1]));
        assert_eq!(cache.get_by_id(1).unwrap().name, "Device 1");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (store, cache) = setup(&[1]);
        cache.remove_item(1).unwrap();
        cache.remove_item(1).unwrap();
        assert_eq!(store.delete_calls(), 1);
    }

    #[test]
    fn test_remove_uncached_does_not_call_store() {
        let (store, cache) = setup(&[]);
        store.seed(make_device(8));
        cache.remove_item(8).unwrap();
        assert_eq!(store.delete_calls(), 0);
        assert!(store.get(8).is_some());
    }

    #[test]
    fn test_rejecting_hook_blocks_store_write() {
        let store = Arc::new(MockStore::new());
        let hook: MutationHook<Device> = Arc::new(|_: &CacheManager<Device>, _: &Device| {
            Err(RosterError::Storage(StorageError::Unavailable {
                reason: "rejected".to_string(),
            }))
        });
        let cache = CacheManager::with_hooks(
            Some(store.clone() as Arc<dyn ObjectStore<Device>>),
            MutationHooks::new().with_insert(hook),
        );

        assert!(cache.add_item(make_device(1)).is_err());
        assert_eq!(store.insert_calls(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let (_store, cache) = setup(&[1]);
        std::thread::scope(|s| {
            for t in 0..4i64 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..50 {
                        let mut device = make_device(1);
                        device.name = format!("writer {} pass {}", t, i);
                        cache.update_item(device).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for _ in 0..200 {
                        let device = cache.get_by_id(1).unwrap();
                        assert_eq!(device.unique_id, "imei-1");
                        assert!(device.name.starts_with("writer") || device.name == "Device 1");
                    }
                });
            }
        });
        assert_eq!(cache.len(), 1);
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// After a successful refresh the cached id set equals the store's id set.
            #[test]
            fn prop_refresh_matches_store(
                initial in proptest::collection::hash_set(0i64..200, 0..30),
                current in proptest::collection::hash_set(0i64..200, 0..30),
            ) {
                let store = Arc::new(MockStore::with_items(initial.iter().map(|id| make_device(*id))));
                let cache = CacheManager::new(Some(store.clone() as Arc<dyn ObjectStore<Device>>));

                for id in &initial {
                    store.remove_direct(*id);
                }
                store.seed_all(current.iter().map(|id| make_device(*id)));

                cache.refresh_all();
                prop_assert_eq!(cache.get_all_ids(), current);
            }

            /// Adding then reading returns the entity; removing then reading returns nothing.
            #[test]
            fn prop_add_remove_roundtrip(
                others in proptest::collection::hash_set(0i64..100, 0..20),
                id in 100i64..200,
            ) {
                let (_store, cache) = setup(&others.iter().copied().collect::<Vec<_>>());
                let device = make_device(id);

                cache.add_item(device.clone()).unwrap();
                let cached = cache.get_by_id(id);
                prop_assert_eq!(cached.as_deref(), Some(&device));

                cache.remove_item(id).unwrap();
                prop_assert!(cache.get_by_id(id).is_none());
                prop_assert_eq!(cache.len(), others.len());
            }
        }
    }
}
