//! ROSTER Test Utilities
//!
//! Centralized test infrastructure for the ROSTER workspace:
//! - Proptest generators for ids, groups and group forests
//! - Fixtures for common cache scenarios
//! - Custom assertions for hierarchy invariants
//! - Tracing setup for tests

// Re-export mocks from their source crate
pub use roster_storage::{MockPermissions, MockStore, MockUsers};

// Re-export core types for convenience
pub use roster_core::{
    CacheSettings, Device, DeviceId, EntityId, EntityIdType, EntityKind, Group, GroupId,
    RosterError, RosterResult, StorageError, UserId, ValidationError,
};
pub use roster_storage::{
    CacheManager, CachedEntity, HierarchicalCacheManager, HierarchicalEntity, ManagedObjects,
    ObjectStore,
};

use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        0i64..10_000
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_entity_id().prop_map(UserId::new)
    }

    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,15}"
    }

    /// An acyclic set of groups with ids `1..=n`.
    ///
    /// Each group's parent, if any, has a smaller id, so the result is a
    /// forest and can be loaded in id order.
    pub fn arb_group_forest(max_size: usize) -> impl Strategy<Value = Vec<Group>> {
        proptest::collection::vec(
            (arb_name(), proptest::option::of(any::<Index>())),
            1..=max_size.max(1),
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (name, parent))| {
                    let group = Group::new(GroupId::new(i as i64 + 1), name);
                    match parent {
                        Some(index) if i > 0 => {
                            group.with_parent(GroupId::new(index.index(i) as i64 + 1))
                        }
                        _ => group,
                    }
                })
                .collect()
        })
    }

    /// A device optionally assigned to one of `group_ids`.
    pub fn arb_device(id: DeviceId, group_ids: Vec<GroupId>) -> impl Strategy<Value = Device> {
        let has_groups = !group_ids.is_empty();
        (
            arb_name(),
            "[0-9]{15}",
            proptest::option::weighted(if has_groups { 0.7 } else { 0.0 }, any::<Index>()),
        )
            .prop_map(move |(name, unique_id, group)| {
                let device = Device::new(id, name, unique_id);
                match group {
                    Some(index) if !group_ids.is_empty() => device.in_group(*index.get(&group_ids)),
                    _ => device,
                }
            })
    }

    /// Grants for `users` users over groups `1..=groups`.
    pub fn arb_grants(
        users: usize,
        groups: i64,
    ) -> impl Strategy<Value = Vec<(UserId, HashSet<EntityId>)>> {
        proptest::collection::vec(proptest::collection::vec(1..=groups.max(1), 0..4), users)
            .prop_map(|grants| {
                grants
                    .into_iter()
                    .enumerate()
                    .map(|(i, ids)| (UserId::new(i as i64 + 1), ids.into_iter().collect()))
                    .collect()
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// Company -> {North -> Vans, South}.
    pub fn fleet_hierarchy() -> Vec<Group> {
        vec![
            Group::new(GroupId::new(1), "Company"),
            Group::new(GroupId::new(2), "North").with_parent(GroupId::new(1)),
            Group::new(GroupId::new(3), "South").with_parent(GroupId::new(1)),
            Group::new(GroupId::new(4), "Vans")
                .with_parent(GroupId::new(2))
                .with_attribute("speedLimit", serde_json::json!(80)),
        ]
    }

    pub fn device(id: i64, group: Option<i64>) -> Device {
        let device = Device::new(DeviceId::new(id), format!("Unit {}", id), format!("86{:013}", id));
        match group {
            Some(group) => device.in_group(GroupId::new(group)),
            None => device,
        }
    }

    /// A store holding `groups` and a hierarchical cache over it.
    pub fn group_cache(
        groups: Vec<Group>,
        settings: &CacheSettings,
    ) -> (Arc<MockStore<Group>>, HierarchicalCacheManager<Group>) {
        let store = Arc::new(MockStore::with_items(groups));
        let manager = HierarchicalCacheManager::new(
            Some(store.clone() as Arc<dyn ObjectStore<Group>>),
            settings,
        );
        (store, manager)
    }

    /// A store holding `devices` and a plain cache over it.
    pub fn device_cache(devices: Vec<Device>) -> (Arc<MockStore<Device>>, CacheManager<Device>) {
        let store = Arc::new(MockStore::with_items(devices));
        let cache = CacheManager::new(Some(store.clone() as Arc<dyn ObjectStore<Device>>));
        (store, cache)
    }

    /// U1 has {1,2} and manages U2; U2 has {3} and manages U3; U3 has {4}.
    pub fn permission_chain() -> (MockPermissions, MockUsers) {
        let permissions = MockPermissions::new()
            .with_grant(UserId::new(1), [1, 2])
            .with_grant(UserId::new(2), [3])
            .with_grant(UserId::new(3), [4]);
        let users = MockUsers::new()
            .with_managed(UserId::new(1), UserId::new(2))
            .with_managed(UserId::new(2), UserId::new(3));
        (permissions, users)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert that no cached group reaches itself by following parents.
pub fn assert_acyclic(manager: &HierarchicalCacheManager<Group>) {
    for id in manager.cache().get_all_ids() {
        let mut seen = HashSet::from([id]);
        let mut next = manager.get_by_id(id).and_then(|g| g.parent_entity_id());
        while let Some(parent) = next {
            assert!(seen.insert(parent), "cycle through group {} reached from {}", parent, id);
            next = manager.get_by_id(parent).and_then(|g| g.parent_entity_id());
        }
    }
}

/// Assert a cache holds exactly `expected` ids.
pub fn assert_ids<T: CachedEntity>(cache: &CacheManager<T>, expected: &[EntityId]) {
    let expected: HashSet<EntityId> = expected.iter().copied().collect();
    assert_eq!(cache.get_all_ids(), expected);
}
