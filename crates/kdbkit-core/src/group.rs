//! Minimal owning container for entries and subgroups.
//!
//! Only what the entry model needs to keep parent links honest lives here;
//! the full group model belongs to the database layer.

use crate::entry::Entry;
use crate::node::{Icon, Node, NodeId, Times, DEFAULT_GROUP_ICON};

/// A group (folder) owning entries and subgroups.
#[derive(Debug, Clone)]
pub struct Group {
    uuid: NodeId,
    parent: Option<NodeId>,
    times: Times,
    icon: Icon,
    pub name: String,
    pub notes: String,
    children: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uuid(NodeId::new(), name)
    }

    /// Create a group with a specific identifier (used when loading).
    pub fn with_uuid(uuid: NodeId, name: impl Into<String>) -> Self {
        Self {
            uuid,
            parent: None,
            times: Times::now(),
            icon: Icon::Builtin(DEFAULT_GROUP_ICON),
            name: name.into(),
            notes: String::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.uuid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn times(&self) -> &Times {
        &self.times
    }

    pub fn icon(&self) -> Icon {
        self.icon
    }

    pub fn set_icon(&mut self, icon: Icon) {
        self.icon = icon;
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Direct child entries.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.children.iter().filter_map(Node::as_entry)
    }

    /// Direct child groups.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.children.iter().filter_map(Node::as_group)
    }

    fn contains_child(&self, id: NodeId) -> bool {
        self.children.iter().any(|node| node.id() == id)
    }

    /// Take ownership of `entry` and point its parent link here.
    ///
    /// A node appears among its parent's children at most once: if a child
    /// with the same identifier exists, the entry is handed back untouched.
    pub fn add_entry(&mut self, mut entry: Entry) -> Result<(), Entry> {
        if self.contains_child(entry.id()) {
            return Err(entry);
        }
        entry.set_parent(Some(self.uuid));
        entry.times_mut().location_changed = chrono::Utc::now();
        self.children.push(Node::Entry(entry));
        Ok(())
    }

    pub fn add_group(&mut self, mut group: Group) -> Result<(), Group> {
        if self.contains_child(group.uuid) {
            return Err(group);
        }
        group.parent = Some(self.uuid);
        group.times.location_changed = chrono::Utc::now();
        self.children.push(Node::Group(group));
        Ok(())
    }

    /// Detach the entry `id` from wherever it lives in this subtree.
    ///
    /// The returned entry has no parent. `None` if it is not in this subtree.
    pub fn remove_entry(&mut self, id: NodeId) -> Option<Entry> {
        let pos = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Entry(e) if e.id() == id));
        if let Some(pos) = pos {
            if let Node::Entry(mut entry) = self.children.remove(pos) {
                entry.detach();
                return Some(entry);
            }
        }

        self.children.iter_mut().find_map(|node| match node {
            Node::Group(g) => g.remove_entry(id),
            Node::Entry(_) => None,
        })
    }

    /// Detach the subgroup `id` from this subtree.
    pub fn remove_group(&mut self, id: NodeId) -> Option<Group> {
        let pos = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Group(g) if g.uuid == id));
        if let Some(pos) = pos {
            if let Node::Group(mut group) = self.children.remove(pos) {
                group.parent = None;
                return Some(group);
            }
        }

        self.children.iter_mut().find_map(|node| match node {
            Node::Group(g) => g.remove_group(id),
            Node::Entry(_) => None,
        })
    }

    /// Find an entry by identifier anywhere in this subtree.
    pub fn find_entry(&self, id: NodeId) -> Option<&Entry> {
        for node in &self.children {
            match node {
                Node::Entry(e) if e.id() == id => return Some(e),
                Node::Group(g) => {
                    if let Some(entry) = g.find_entry(id) {
                        return Some(entry);
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn find_entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        for node in &mut self.children {
            match node {
                Node::Entry(e) if e.id() == id => return Some(e),
                Node::Group(g) => {
                    if let Some(entry) = g.find_entry_mut(id) {
                        return Some(entry);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// All entries of this subtree, depth first.
    pub fn all_entries(&self) -> Vec<&Entry> {
        let mut out = Vec::new();
        self.collect_entries(&mut out);
        out
    }

    fn collect_entries<'a>(&'a self, out: &mut Vec<&'a Entry>) {
        for node in &self.children {
            match node {
                Node::Entry(e) => out.push(e),
                Node::Group(g) => g.collect_entries(out),
            }
        }
    }
}
