//! Properties shared by every member of the database tree.

use crate::entry::Entry;
use crate::group::Group;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a group or entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Timestamps kept for every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Times {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// `None` means the node never expires.
    pub expires: Option<DateTime<Utc>>,
    pub usage_count: u64,
    /// Last time the node was moved to another parent.
    pub location_changed: DateTime<Utc>,
}

impl Times {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            last_modified: now,
            last_accessed: now,
            expires: None,
            usage_count: 0,
            location_changed: now,
        }
    }

    pub fn touch_modified(&mut self) {
        let now = Utc::now();
        self.last_modified = now;
        self.last_accessed = now;
    }

    pub fn touch_accessed(&mut self) {
        self.last_accessed = Utc::now();
        self.usage_count = self.usage_count.saturating_add(1);
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|exp| exp < now).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::now()
    }
}

/// Index of the standard KeePass icon used for new entries.
pub const DEFAULT_ENTRY_ICON: u32 = 0;
/// Index of the standard KeePass folder icon used for new groups.
pub const DEFAULT_GROUP_ICON: u32 = 48;

/// Icon reference. Custom icon data lives in an external icon store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Icon {
    Builtin(u32),
    Custom(Uuid),
}

impl Default for Icon {
    fn default() -> Self {
        Icon::Builtin(DEFAULT_ENTRY_ICON)
    }
}

/// A member of the database tree.
#[derive(Debug, Clone)]
pub enum Node {
    Group(Group),
    Entry(Entry),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Group(g) => g.id(),
            Node::Entry(e) => e.id(),
        }
    }

    /// Identifier of the owning group, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Group(g) => g.parent(),
            Node::Entry(e) => e.parent(),
        }
    }

    pub fn times(&self) -> &Times {
        match self {
            Node::Group(g) => g.times(),
            Node::Entry(e) => e.times(),
        }
    }

    pub fn icon(&self) -> Icon {
        match self {
            Node::Group(g) => g.icon(),
            Node::Entry(e) => e.icon(),
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Node::Entry(e) => Some(e),
            Node::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Entry(_) => None,
        }
    }
}

impl From<Entry> for Node {
    fn from(entry: Entry) -> Self {
        Node::Entry(entry)
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(group)
    }
}
