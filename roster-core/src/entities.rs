//! Core entity structures

use crate::{DeviceId, GroupId};
use serde::{Deserialize, Serialize};

/// Free-form attributes attached to an entity.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Entity kind discriminator, passed to stores that serve several kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Group,
    Device,
    User,
}

/// Group - a node in the group-of-groups hierarchy.
/// A group with no parent is a root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub parent_id: Option<GroupId>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Group {
    /// Create a root group.
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            attributes: Attributes::new(),
        }
    }

    /// Set the parent group.
    pub fn with_parent(mut self, parent_id: GroupId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Whether this group has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Device - a tracked unit that may belong to a group.
/// Devices do not form a hierarchy among themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// External identifier reported by the unit itself.
    pub unique_id: String,
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unique_id: unique_id.into(),
            group_id: None,
            attributes: Attributes::new(),
        }
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}
