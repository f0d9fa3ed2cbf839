//! Write-through entity caches.
//!
//! A [`CacheManager`] mirrors the complete collection of one entity kind in
//! memory. Reads are served from memory only; writes go to the store first
//! and are mirrored once the store accepted them; a refresh reloads the
//! full collection and reconciles against it.
//!
//! # Staleness
//!
//! Reads never fail because the store is down. A failed refresh is logged
//! and the cache keeps serving what it had, so callers should expect
//! possibly stale data rather than errors on the read path.
//!
//! # Hierarchies
//!
//! [`HierarchicalCacheManager`] wraps a cache for entities that point at a
//! parent of the same kind. It refuses mutations that would close a parent
//! cycle and debounces refreshes with a [`RefreshThrottle`].
//!
//! # Example
//!
//! ```ignore
//! let store: Arc<dyn ObjectStore<Group>> = Arc::new(MockStore::with_items(groups));
//! let groups = HierarchicalCacheManager::new(Some(store), &CacheSettings::from_env());
//!
//! // Rejected before the store is called
//! let err = groups.update_item(root.with_parent(child_id)).unwrap_err();
//! assert!(err.is_hierarchy_cycle());
//!
//! // At most one caller per interval reaches the store
//! groups.refresh(false);
//! ```
//!
//! Every refresh reloads the whole collection. That keeps deletion
//! detection exact and is fine for collections of modest size.

pub mod hierarchy;
pub mod manager;
pub mod throttle;
pub mod traits;

pub use hierarchy::{check_cycles, HierarchicalCacheManager};
pub use manager::{CacheManager, MutationHook, MutationHooks};
pub use throttle::RefreshThrottle;
pub use traits::{CacheStats, CachedEntity, HierarchicalEntity};
