//! Entry types and operations

use crate::attribute::{Attribute, AttributeId, ProtectedString};
use crate::binary::{Binary, BinaryId};
use crate::config::Config;
use crate::node::{Icon, NodeId, Times};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const TITLE_KEY: &str = "Title";
pub const USERNAME_KEY: &str = "UserName";
pub const PASSWORD_KEY: &str = "Password";
pub const URL_KEY: &str = "URL";
pub const NOTES_KEY: &str = "Notes";

/// Keys KDBX reserves for the standard string fields.
pub const STANDARD_KEYS: [&str; 5] = [TITLE_KEY, USERNAME_KEY, PASSWORD_KEY, URL_KEY, NOTES_KEY];

/// Handle identifying one history snapshot.
///
/// Snapshots carry the UUID of the entry they belong to, so they need their
/// own handle to be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryId(Uuid);

impl HistoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HistoryId {
    fn default() -> Self {
        Self::new()
    }
}

/// A frozen earlier state of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(skip, default)]
    id: HistoryId,
    #[serde(deserialize_with = "deserialize_snapshot")]
    entry: Entry,
}

/// Snapshots read from outside go through the same flattening as inserts.
fn deserialize_snapshot<'de, D>(deserializer: D) -> std::result::Result<Entry, D::Error>
where
    D: Deserializer<'de>,
{
    let mut entry = Entry::deserialize(deserializer)?;
    entry.strip_nested_history();
    Ok(entry)
}

impl HistoryItem {
    pub fn id(&self) -> HistoryId {
        self.id
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}

/// A password entry in a KeePass database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    uuid: NodeId,
    /// Owning group; never an owning reference.
    #[serde(default)]
    parent: Option<NodeId>,
    times: Times,
    #[serde(default)]
    icon: Icon,
    title: Option<String>,
    username: Option<String>,
    password: Option<ProtectedString>,
    url: Option<String>,
    notes: Option<String>,
    tags: Option<String>,
    foreground_color: Option<String>,
    background_color: Option<String>,
    override_url: Option<String>,
    #[serde(default)]
    custom_attributes: Vec<Attribute>,
    #[serde(default)]
    binaries: Vec<Arc<Binary>>,
    #[serde(default)]
    history: Vec<HistoryItem>,
}

/// Getter, setter and clearer for an optional text field.
macro_rules! text_field {
    ($field:ident, $set:ident, $clear:ident) => {
        pub fn $field(&self) -> Option<&str> {
            self.$field.as_deref()
        }

        pub fn $set(&mut self, value: impl Into<String>) {
            self.$field = Some(value.into());
            self.times.touch_modified();
        }

        pub fn $clear(&mut self) {
            self.$field = None;
            self.times.touch_modified();
        }
    };
}

impl Entry {
    /// Create an empty entry with a fresh identifier.
    pub fn new() -> Self {
        Self::with_uuid(NodeId::new())
    }

    /// Create an empty entry with a known identifier (used when loading).
    pub fn with_uuid(uuid: NodeId) -> Self {
        Self {
            uuid,
            parent: None,
            times: Times::now(),
            icon: Icon::default(),
            title: None,
            username: None,
            password: None,
            url: None,
            notes: None,
            tags: None,
            foreground_color: None,
            background_color: None,
            override_url: None,
            custom_attributes: Vec::new(),
            binaries: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.uuid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Forget the owning group. Used when an entry was taken out of its group
    /// by means other than [`Group::remove_entry`](crate::Group::remove_entry).
    pub fn detach(&mut self) {
        self.parent = None;
    }

    pub fn times(&self) -> &Times {
        &self.times
    }

    pub fn times_mut(&mut self) -> &mut Times {
        &mut self.times
    }

    pub fn icon(&self) -> Icon {
        self.icon
    }

    pub fn set_icon(&mut self, icon: Icon) {
        self.icon = icon;
        self.times.touch_modified();
    }

    text_field!(title, set_title, clear_title);
    text_field!(username, set_username, clear_username);
    text_field!(url, set_url, clear_url);
    text_field!(notes, set_notes, clear_notes);
    text_field!(tags, set_tags, clear_tags);
    text_field!(foreground_color, set_foreground_color, clear_foreground_color);
    text_field!(background_color, set_background_color, clear_background_color);
    text_field!(override_url, set_override_url, clear_override_url);

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|s| s.as_str())
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(ProtectedString::new(password));
        self.times.touch_modified();
    }

    /// Drop the password; its memory is zeroed.
    pub fn clear_password(&mut self) {
        self.password = None;
        self.times.touch_modified();
    }

    /// Record an access.
    pub fn touch(&mut self) {
        self.times.touch_accessed();
    }

    /// Whether this entry is a legacy carrier for database metadata.
    pub fn is_meta(&self) -> bool {
        crate::meta::is_meta_entry(self)
    }

    // Custom attributes

    pub fn custom_attributes(&self) -> &[Attribute] {
        &self.custom_attributes
    }

    /// First attribute whose key matches exactly.
    pub fn custom_attribute_for_key(&self, key: &str) -> Option<&Attribute> {
        self.custom_attributes.iter().find(|a| a.key() == key)
    }

    pub fn custom_attribute_for_key_mut(&mut self, key: &str) -> Option<&mut Attribute> {
        self.custom_attributes.iter_mut().find(|a| a.key() == key)
    }

    pub fn has_attribute_with_key(&self, key: &str) -> bool {
        self.custom_attribute_for_key(key).is_some()
    }

    fn key_in_use(&self, key: &str) -> bool {
        STANDARD_KEYS.contains(&key) || self.has_attribute_with_key(key)
    }

    /// A key derived from `key` that no attribute of this entry uses yet.
    ///
    /// Returns `key` itself when it is free, otherwise `key-1`, `key-2`, ...
    /// Standard field names count as taken.
    pub fn proposed_key_for_attribute_key(&self, key: &str) -> String {
        if !self.key_in_use(key) {
            return key.to_owned();
        }
        let mut counter = 1usize;
        loop {
            let candidate = format!("{}-{}", key, counter);
            if !self.key_in_use(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Insert at `index`, or append when `index` is past the end.
    ///
    /// Key uniqueness is the caller's business; see
    /// [`proposed_key_for_attribute_key`](Self::proposed_key_for_attribute_key).
    pub fn add_custom_attribute_at(&mut self, attribute: Attribute, index: usize) -> AttributeId {
        let id = attribute.id();
        let index = index.min(self.custom_attributes.len());
        self.custom_attributes.insert(index, attribute);
        self.times.touch_modified();
        id
    }

    pub fn add_custom_attribute(&mut self, attribute: Attribute) -> AttributeId {
        let end = self.custom_attributes.len();
        self.add_custom_attribute_at(attribute, end)
    }

    /// Remove the attribute with this handle, if present.
    pub fn remove_custom_attribute(&mut self, id: AttributeId) -> Option<Attribute> {
        let pos = self.custom_attributes.iter().position(|a| a.id() == id)?;
        self.times.touch_modified();
        Some(self.custom_attributes.remove(pos))
    }

    // Attachments

    pub fn binaries(&self) -> &[Arc<Binary>] {
        &self.binaries
    }

    pub fn binary_named(&self, name: &str) -> Option<&Arc<Binary>> {
        self.binaries.iter().find(|b| b.name == name)
    }

    /// Attach `binary` at `index` (clamped). The blob is shared, not copied.
    pub fn add_binary_at(&mut self, binary: Arc<Binary>, index: usize) {
        let index = index.min(self.binaries.len());
        self.binaries.insert(index, binary);
        self.times.touch_modified();
    }

    pub fn add_binary(&mut self, binary: Arc<Binary>) {
        let end = self.binaries.len();
        self.add_binary_at(binary, end);
    }

    /// Detach the first attachment with this handle, if present.
    pub fn remove_binary(&mut self, id: BinaryId) -> Option<Arc<Binary>> {
        let pos = self.binaries.iter().position(|b| b.id() == id)?;
        self.times.touch_modified();
        Some(self.binaries.remove(pos))
    }

    // History

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    /// Insert a snapshot at `index` (clamped).
    ///
    /// History is one level deep: any history carried by `entry` is dropped.
    pub fn add_history_entry_at(&mut self, mut entry: Entry, index: usize) -> HistoryId {
        entry.strip_nested_history();
        entry.parent = None;

        let item = HistoryItem {
            id: HistoryId::new(),
            entry,
        };
        let id = item.id;
        let index = index.min(self.history.len());
        self.history.insert(index, item);
        id
    }

    fn strip_nested_history(&mut self) {
        if !self.history.is_empty() {
            tracing::debug!(
                uuid = %self.uuid,
                dropped = self.history.len(),
                "flattening nested history of snapshot"
            );
            self.history.clear();
        }
    }

    pub fn add_history_entry(&mut self, entry: Entry) -> HistoryId {
        let end = self.history.len();
        self.add_history_entry_at(entry, end)
    }

    pub fn remove_history_entry(&mut self, id: HistoryId) -> Option<Entry> {
        let pos = self.history.iter().position(|h| h.id == id)?;
        Some(self.history.remove(pos).entry)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Copy of the current state suitable for storing as history.
    pub fn snapshot(&self) -> Entry {
        let mut copy = self.clone();
        copy.history.clear();
        copy.parent = None;
        copy
    }

    /// Store the current state as the newest history snapshot.
    pub fn push_history(&mut self) -> HistoryId {
        let snapshot = self.snapshot();
        self.add_history_entry(snapshot)
    }

    /// Roll back to the snapshot `id`. The state being replaced is kept in
    /// history first. Returns `false` if there is no such snapshot.
    pub fn restore_from_history(&mut self, id: HistoryId) -> bool {
        let Some(snapshot) = self
            .history
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.entry.clone())
        else {
            return false;
        };

        self.push_history();
        let history = std::mem::take(&mut self.history);
        let parent = self.parent;
        let uuid = self.uuid;
        *self = snapshot;
        self.uuid = uuid;
        self.parent = parent;
        self.history = history;
        self.times.touch_modified();
        true
    }

    /// Drop the oldest snapshots until at most `max_items` remain and their
    /// estimated size is at most `max_size` bytes. Negative limits disable the
    /// respective check. Returns the number of snapshots removed.
    pub fn maintain_history(&mut self, max_items: i32, max_size: i64) -> usize {
        let before = self.history.len();

        if let Ok(max_items) = usize::try_from(max_items) {
            if self.history.len() > max_items {
                let excess = self.history.len() - max_items;
                self.history.drain(..excess);
            }
        }

        if let Ok(max_size) = u64::try_from(max_size) {
            let mut total: u64 = self.history.iter().map(|h| h.entry.estimated_size()).sum();
            while total > max_size && !self.history.is_empty() {
                let oldest = self.history.remove(0);
                total -= oldest.entry.estimated_size();
            }
        }

        let removed = before - self.history.len();
        if removed > 0 {
            tracing::debug!(uuid = %self.uuid, removed, "trimmed entry history");
        }
        removed
    }

    /// [`maintain_history`](Self::maintain_history) with the configured limits.
    pub fn maintain_history_with(&mut self, config: &Config) -> usize {
        self.maintain_history(config.history_max_items, config.history_max_size)
    }

    /// Rough number of bytes held by fields, attributes and attachments.
    pub fn estimated_size(&self) -> u64 {
        let text = [
            self.title.as_deref(),
            self.username.as_deref(),
            self.password(),
            self.url.as_deref(),
            self.notes.as_deref(),
            self.tags.as_deref(),
            self.foreground_color.as_deref(),
            self.background_color.as_deref(),
            self.override_url.as_deref(),
        ]
        .iter()
        .flatten()
        .map(|s| s.len() as u64)
        .sum::<u64>();

        let attributes = self
            .custom_attributes
            .iter()
            .map(|a| (a.key().len() + a.value().len()) as u64)
            .sum::<u64>();

        let binaries = self
            .binaries
            .iter()
            .map(|b| (b.name.len() + b.len()) as u64)
            .sum::<u64>();

        let history = self
            .history
            .iter()
            .map(|h| h.entry.estimated_size())
            .sum::<u64>();

        text + attributes + binaries + history
    }

    /// Deep copy with a new identifier and fresh timestamps.
    ///
    /// Attachments stay shared. History snapshots move to the new identifier.
    pub fn duplicate(&self) -> Entry {
        let mut copy = self.clone();
        copy.uuid = NodeId::new();
        copy.parent = None;
        copy.times = Times::now();
        for item in &mut copy.history {
            item.id = HistoryId::new();
            item.entry.uuid = copy.uuid;
        }
        copy
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating entries
pub struct EntryBuilder {
    entry: Entry,
}

impl EntryBuilder {
    pub fn new() -> Self {
        Self {
            entry: Entry::new(),
        }
    }

    pub fn uuid(mut self, uuid: NodeId) -> Self {
        self.entry.uuid = uuid;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.entry.title = Some(title.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.entry.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.entry.password = Some(ProtectedString::new(password));
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.entry.url = Some(url.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.entry.notes = Some(notes.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.entry.tags = Some(tags.into());
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.entry.custom_attributes.push(attribute);
        self
    }

    pub fn binary(mut self, binary: Arc<Binary>) -> Self {
        self.entry.binaries.push(binary);
        self
    }

    pub fn build(self) -> Entry {
        self.entry
    }
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_keys(keys: &[&str]) -> Entry {
        let mut entry = Entry::new();
        for key in keys {
            entry.add_custom_attribute(Attribute::new(*key, "value"));
        }
        entry
    }

    #[test]
    fn test_entry_builder() {
        let entry = EntryBuilder::new()
            .title("GitHub")
            .username("user@example.com")
            .password("secret123")
            .url("https://github.com")
            .notes("My GitHub account")
            .attribute(Attribute::new("2FA", "enabled"))
            .build();

        assert_eq!(entry.title(), Some("GitHub"));
        assert_eq!(entry.username(), Some("user@example.com"));
        assert_eq!(entry.password(), Some("secret123"));
        assert_eq!(entry.url(), Some("https://github.com"));
        assert_eq!(entry.notes(), Some("My GitHub account"));
        assert_eq!(
            entry.custom_attribute_for_key("2FA").map(|a| a.value()),
            Some("enabled")
        );
        assert!(entry.history().is_empty());
        assert!(entry.parent().is_none());
    }

    #[test]
    fn test_optional_fields_clear() {
        let mut entry = Entry::new();
        assert!(entry.tags().is_none());
        entry.set_tags("work;dev");
        entry.set_foreground_color("#FF0000");
        assert_eq!(entry.tags(), Some("work;dev"));
        entry.clear_tags();
        assert!(entry.tags().is_none());
        assert_eq!(entry.foreground_color(), Some("#FF0000"));

        entry.set_password("hunter2");
        entry.clear_password();
        assert!(entry.password().is_none());
    }

    #[test]
    fn test_attribute_lookup_is_case_sensitive_first_match() {
        let mut entry = Entry::new();
        entry.add_custom_attribute(Attribute::new("pin", "1"));
        entry.add_custom_attribute(Attribute::new("pin", "2"));
        assert_eq!(entry.custom_attribute_for_key("pin").unwrap().value(), "1");
        assert!(!entry.has_attribute_with_key("PIN"));
        assert!(entry.custom_attribute_for_key("PIN").is_none());
    }

    #[test]
    fn test_proposed_key() {
        let entry = entry_with_keys(&["a", "b"]);
        let proposed = entry.proposed_key_for_attribute_key("a");
        assert_ne!(proposed, "a");
        assert!(!entry.has_attribute_with_key(&proposed));
        assert_eq!(proposed, "a-1");
        assert_eq!(entry.proposed_key_for_attribute_key("c"), "c");

        let entry = entry_with_keys(&["a", "a-1", "a-2"]);
        assert_eq!(entry.proposed_key_for_attribute_key("a"), "a-3");

        // Standard fields are taken even without a custom attribute.
        assert_eq!(entry.proposed_key_for_attribute_key("Title"), "Title-1");
    }

    #[test]
    fn test_add_attribute_at_index() {
        let mut entry = entry_with_keys(&["a", "b"]);
        entry.add_custom_attribute_at(Attribute::new("first", "x"), 0);
        entry.add_custom_attribute_at(Attribute::new("last", "x"), 99);
        let keys: Vec<&str> = entry.custom_attributes().iter().map(|a| a.key()).collect();
        assert_eq!(keys, vec!["first", "a", "b", "last"]);
    }

    #[test]
    fn test_remove_attribute_by_identity() {
        let mut entry = Entry::new();
        let first = entry.add_custom_attribute(Attribute::new("k", "v"));
        let second = entry.add_custom_attribute(Attribute::new("k", "v"));

        let removed = entry.remove_custom_attribute(second).unwrap();
        assert_eq!(removed.id(), second);
        assert_eq!(entry.custom_attributes().len(), 1);
        assert_eq!(entry.custom_attributes()[0].id(), first);

        // Stale and foreign handles are no-ops.
        assert!(entry.remove_custom_attribute(second).is_none());
        assert!(entry
            .remove_custom_attribute(Attribute::new("k", "v").id())
            .is_none());
        assert_eq!(entry.custom_attributes().len(), 1);
    }

    #[test]
    fn test_binaries_are_shared_and_ordered() {
        let icon = Binary::shared("icon.png", vec![1, 2, 3]);
        let doc = Binary::shared("doc.pdf", vec![4]);

        let mut entry = Entry::new();
        entry.add_binary(icon.clone());
        entry.add_binary_at(doc.clone(), 0);
        assert_eq!(entry.binaries()[0].name, "doc.pdf");
        assert_eq!(entry.binaries()[1].name, "icon.png");

        let copy = entry.clone();
        assert!(Arc::ptr_eq(&copy.binaries()[1], &icon));

        assert!(entry.remove_binary(Binary::new("x", vec![]).id()).is_none());
        let removed = entry.remove_binary(doc.id()).unwrap();
        assert!(Arc::ptr_eq(&removed, &doc));
        assert_eq!(entry.binaries().len(), 1);
        assert!(entry.binary_named("icon.png").is_some());
        // The copy is unaffected.
        assert_eq!(copy.binaries().len(), 2);
    }

    #[test]
    fn test_history_is_flattened() {
        let mut older = Entry::new();
        older.set_title("v1");
        older.push_history();
        assert_eq!(older.history().len(), 1);

        let mut entry = Entry::new();
        entry.add_history_entry(older);
        assert_eq!(entry.history().len(), 1);
        assert!(entry.history()[0].entry().history().is_empty());

        entry.push_history();
        assert!(entry.history().iter().all(|h| h.entry().history().is_empty()));

        entry.clear_history();
        assert!(entry.history().is_empty());
    }

    #[test]
    fn test_remove_history_entry() {
        let mut entry = Entry::new();
        let first = entry.push_history();
        let second = entry.push_history();
        assert!(entry.remove_history_entry(first).is_some());
        assert!(entry.remove_history_entry(first).is_none());
        assert_eq!(entry.history().len(), 1);
        assert_eq!(entry.history()[0].id(), second);

        // A handle that was never issued by this entry changes nothing.
        assert!(entry.remove_history_entry(HistoryId::new()).is_none());
        assert_eq!(entry.history().len(), 1);
        assert_eq!(entry.history()[0].id(), second);
    }

    #[test]
    fn test_deserialized_history_is_flattened() {
        let mut older = Entry::new();
        older.set_title("v1");
        older.push_history();

        // Bypass add_history_entry to build the nested shape foreign data can carry.
        let mut entry = Entry::new();
        entry.history.push(HistoryItem {
            id: HistoryId::new(),
            entry: older,
        });
        assert_eq!(entry.history()[0].entry().history().len(), 1);

        let value = toml::Value::try_from(&entry).unwrap();
        let restored: Entry = value.try_into().unwrap();
        assert_eq!(restored.history().len(), 1);
        assert_eq!(restored.history()[0].entry().title(), Some("v1"));
        assert!(restored.history()[0].entry().history().is_empty());
    }

    #[test]
    fn test_restore_from_history() {
        let mut entry = Entry::new();
        entry.set_title("before");
        let id = entry.push_history();
        entry.set_title("after");

        assert!(entry.restore_from_history(id));
        assert_eq!(entry.title(), Some("before"));
        assert_eq!(entry.history().len(), 2);
        assert_eq!(entry.history()[1].entry().title(), Some("after"));
        assert!(!entry.restore_from_history(HistoryId::new()));
    }

    #[test]
    fn test_maintain_history_by_count() {
        let mut entry = Entry::new();
        for n in 0..4 {
            entry.set_title(format!("v{}", n));
            entry.push_history();
        }
        assert_eq!(entry.maintain_history(2, -1), 2);
        let titles: Vec<_> = entry
            .history()
            .iter()
            .map(|h| h.entry().title().unwrap())
            .collect();
        assert_eq!(titles, vec!["v2", "v3"]);
        assert_eq!(entry.maintain_history(-1, -1), 0);
    }

    #[test]
    fn test_maintain_history_by_size() {
        let mut entry = Entry::new();
        entry.add_binary(Binary::shared("blob", vec![0u8; 100]));
        entry.push_history();
        entry.push_history();
        entry.push_history();

        let one = entry.history()[0].entry().estimated_size();
        assert_eq!(entry.maintain_history(-1, (one * 2) as i64), 1);
        assert_eq!(entry.history().len(), 2);
        assert_eq!(entry.maintain_history(10, 0), 2);
        assert!(entry.history().is_empty());
    }

    #[test]
    fn test_duplicate_gets_new_identity() {
        let mut entry = EntryBuilder::new().title("Mail").build();
        entry.push_history();
        let copy = entry.duplicate();
        assert_ne!(copy.id(), entry.id());
        assert_eq!(copy.title(), Some("Mail"));
        assert_eq!(copy.history()[0].entry().id(), copy.id());
        assert_ne!(copy.history()[0].id(), entry.history()[0].id());
    }
}
