//! Permission and user-management collaborators.
//!
//! The caches do not resolve permissions themselves; they compose the
//! answers of these sources to tell which entities a user can see or
//! manage.

use roster_core::{EntityId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Maps users to the group ids they were granted directly.
pub trait PermissionSource: Send + Sync {
    /// Group ids user `user_id` holds a direct permission on.
    fn group_permissions(&self, user_id: UserId) -> HashSet<EntityId>;
}

/// User-management subsystem.
pub trait UserSource: Send + Sync {
    /// Users directly managed by `user_id`.
    fn users_managed_by(&self, user_id: UserId) -> HashSet<UserId>;
}

/// Per-user visibility of a cached collection.
pub trait ManagedObjects {
    /// Ids the user has direct permission on.
    fn get_user_items(&self, user_id: UserId) -> HashSet<EntityId>;

    /// Ids the user has permission on, plus those of the users it manages.
    ///
    /// Transitive exactly one level: users managed by managed users do not
    /// contribute.
    fn get_managed_items(&self, user_id: UserId) -> HashSet<EntityId>;
}

// ============================================================================
// MOCK SOURCES
// ============================================================================

/// In-memory [`PermissionSource`].
#[derive(Debug, Default)]
pub struct MockPermissions {
    grants: RwLock<HashMap<UserId, HashSet<EntityId>>>,
}

impl MockPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `user_id` direct permission on `ids`.
    pub fn grant(&self, user_id: UserId, ids: impl IntoIterator<Item = EntityId>) {
        if let Ok(mut grants) = self.grants.write() {
            grants.entry(user_id).or_default().extend(ids);
        }
    }

    /// Builder form of [`MockPermissions::grant`].
    pub fn with_grant(self, user_id: UserId, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.grant(user_id, ids);
        self
    }
}

impl PermissionSource for MockPermissions {
    fn group_permissions(&self, user_id: UserId) -> HashSet<EntityId> {
        self.grants
            .read()
            .ok()
            .and_then(|grants| grants.get(&user_id).cloned())
            .unwrap_or_default()
    }
}

/// In-memory [`UserSource`].
#[derive(Debug, Default)]
pub struct MockUsers {
    managed: RwLock<HashMap<UserId, HashSet<UserId>>>,
}

impl MockUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `manager` manages `user_id`.
    pub fn manage(&self, manager: UserId, user_id: UserId) {
        if let Ok(mut managed) = self.managed.write() {
            managed.entry(manager).or_default().insert(user_id);
        }
    }

    /// Builder form of [`MockUsers::manage`].
    pub fn with_managed(self, manager: UserId, user_id: UserId) -> Self {
        self.manage(manager, user_id);
        self
    }
}

impl UserSource for MockUsers {
    fn users_managed_by(&self, user_id: UserId) -> HashSet<UserId> {
        self.managed
            .read()
            .ok()
            .and_then(|managed| managed.get(&user_id).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::EntityIdType;

    #[test]
    fn test_mock_permissions_accumulate_grants() {
        let permissions = MockPermissions::new()
            .with_grant(UserId::new(1), [1, 2])
            .with_grant(UserId::new(1), [3]);
        assert_eq!(
            permissions.group_permissions(UserId::new(1)),
            HashSet::from([1, 2, 3])
        );
        assert!(permissions.group_permissions(UserId::new(2)).is_empty());
    }

    #[test]
    fn test_mock_users_managed_by() {
        let users = MockUsers::new()
            .with_managed(UserId::new(1), UserId::new(2))
            .with_managed(UserId::new(1), UserId::new(3));
        assert_eq!(
            users.users_managed_by(UserId::new(1)),
            HashSet::from([UserId::new(2), UserId::new(3)])
        );
        assert!(users.users_managed_by(UserId::new(2)).is_empty());
    }
}
