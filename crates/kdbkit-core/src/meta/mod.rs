//! Legacy meta-entries.
//!
//! KDB files have no place for database metadata, so KeePass 1.x and KeePassX
//! store it in ordinary entries marked with a fixed title, user name and URL.
//! The entry notes name the kind of data, and a single attachment called
//! `bin-stream` carries the payload. Sentinels must match byte for byte or the
//! data is silently lost on the next save.

mod payload;

pub use payload::{Color, CustomIcons, EntryIcon, GroupIcon, GroupTreeItem, UiState};

use crate::binary::Binary;
use crate::config::Config;
use crate::entry::{Entry, EntryBuilder};
use crate::error::{Error, Result};
use crate::io::{DataStreamReader, DataStreamWriter};
use serde::{Deserialize, Serialize};

pub const META_ENTRY_BINARY_DESCRIPTION: &str = "bin-stream";
pub const META_ENTRY_TITLE: &str = "Meta-Info";
pub const META_ENTRY_USERNAME: &str = "SYSTEM";
pub const META_ENTRY_URL: &str = "$";

pub const META_ENTRY_UI_STATE: &str = "Simple UI State";
pub const META_ENTRY_DEFAULT_USERNAME: &str = "Default User Name";
pub const META_ENTRY_SEARCH_HISTORY_ITEM: &str = "Search History Item";
pub const META_ENTRY_CUSTOM_KVP: &str = "Custom KVP";
pub const META_ENTRY_DATABASE_COLOR: &str = "Database Color";
pub const META_ENTRY_KEEPASSX_CUSTOM_ICON: &str = "KPX_CUSTOM_ICONS_2";
pub const META_ENTRY_KEEPASSX_CUSTOM_ICON_2: &str = "KPX_CUSTOM_ICONS_4";
pub const META_ENTRY_KEEPASSX_GROUP_TREE_STATE: &str = "KPX_GROUP_TREE_STATE";

/// Whether `entry` is a metadata carrier rather than a credential.
pub fn is_meta_entry(entry: &Entry) -> bool {
    entry.title() == Some(META_ENTRY_TITLE)
        && entry.username() == Some(META_ENTRY_USERNAME)
        && entry.url() == Some(META_ENTRY_URL)
        && matches!(entry.binaries(), [only] if only.name == META_ENTRY_BINARY_DESCRIPTION)
}

/// Which of the two KeePassX custom icon streams a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconEncoding {
    /// `KPX_CUSTOM_ICONS_2`
    Legacy,
    /// `KPX_CUSTOM_ICONS_4`
    Current,
}

/// Kind of a meta-entry, named by its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaKind {
    UiState,
    DefaultUsername,
    SearchHistoryItem,
    CustomKvp,
    DatabaseColor,
    CustomIcons(IconEncoding),
    GroupTreeState,
    /// A kind this crate does not interpret. Kept for round-tripping.
    Unknown(String),
}

impl MetaKind {
    pub fn from_description(description: &str) -> Self {
        match description {
            META_ENTRY_UI_STATE => MetaKind::UiState,
            META_ENTRY_DEFAULT_USERNAME => MetaKind::DefaultUsername,
            META_ENTRY_SEARCH_HISTORY_ITEM => MetaKind::SearchHistoryItem,
            META_ENTRY_CUSTOM_KVP => MetaKind::CustomKvp,
            META_ENTRY_DATABASE_COLOR => MetaKind::DatabaseColor,
            META_ENTRY_KEEPASSX_CUSTOM_ICON => MetaKind::CustomIcons(IconEncoding::Legacy),
            META_ENTRY_KEEPASSX_CUSTOM_ICON_2 => MetaKind::CustomIcons(IconEncoding::Current),
            META_ENTRY_KEEPASSX_GROUP_TREE_STATE => MetaKind::GroupTreeState,
            other => MetaKind::Unknown(other.to_owned()),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            MetaKind::UiState => META_ENTRY_UI_STATE,
            MetaKind::DefaultUsername => META_ENTRY_DEFAULT_USERNAME,
            MetaKind::SearchHistoryItem => META_ENTRY_SEARCH_HISTORY_ITEM,
            MetaKind::CustomKvp => META_ENTRY_CUSTOM_KVP,
            MetaKind::DatabaseColor => META_ENTRY_DATABASE_COLOR,
            MetaKind::CustomIcons(IconEncoding::Legacy) => META_ENTRY_KEEPASSX_CUSTOM_ICON,
            MetaKind::CustomIcons(IconEncoding::Current) => META_ENTRY_KEEPASSX_CUSTOM_ICON_2,
            MetaKind::GroupTreeState => META_ENTRY_KEEPASSX_GROUP_TREE_STATE,
            MetaKind::Unknown(description) => description,
        }
    }
}

/// Decoded content of a meta-entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaItem {
    UiState(UiState),
    DefaultUsername(String),
    SearchHistoryItem(String),
    CustomKvp(Vec<(String, String)>),
    DatabaseColor(Color),
    CustomIcons {
        encoding: IconEncoding,
        icons: CustomIcons,
    },
    GroupTreeState(Vec<GroupTreeItem>),
    Unknown {
        description: String,
        data: Vec<u8>,
    },
}

impl MetaItem {
    pub fn kind(&self) -> MetaKind {
        match self {
            MetaItem::UiState(_) => MetaKind::UiState,
            MetaItem::DefaultUsername(_) => MetaKind::DefaultUsername,
            MetaItem::SearchHistoryItem(_) => MetaKind::SearchHistoryItem,
            MetaItem::CustomKvp(_) => MetaKind::CustomKvp,
            MetaItem::DatabaseColor(_) => MetaKind::DatabaseColor,
            MetaItem::CustomIcons { encoding, .. } => MetaKind::CustomIcons(*encoding),
            MetaItem::GroupTreeState(_) => MetaKind::GroupTreeState,
            MetaItem::Unknown { description, .. } => MetaKind::Unknown(description.clone()),
        }
    }

    /// Decode a meta-entry. `Ok(None)` if `entry` is an ordinary entry.
    ///
    /// A known kind with a payload that does not decode is an error; use
    /// [`decode_lossless`](Self::decode_lossless) to keep such data instead.
    pub fn decode(entry: &Entry) -> Result<Option<Self>> {
        let Some((description, data)) = meta_parts(entry) else {
            return Ok(None);
        };
        Self::decode_payload(MetaKind::from_description(description), data).map(Some)
    }

    /// Like [`decode`](Self::decode), but a malformed payload of a known kind
    /// is returned as [`MetaItem::Unknown`] with its bytes intact.
    pub fn decode_lossless(entry: &Entry) -> Option<Self> {
        let (description, data) = meta_parts(entry)?;
        match Self::decode_payload(MetaKind::from_description(description), data) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(%err, description, "keeping undecodable meta-entry verbatim");
                Some(MetaItem::Unknown {
                    description: description.to_owned(),
                    data: data.to_vec(),
                })
            }
        }
    }

    /// Decode a raw payload of the given kind.
    ///
    /// A payload carrying bytes the typed value does not model (trailing data,
    /// a non-zero COLORREF high byte, text past the terminator) is rejected,
    /// since re-encoding would lose them.
    pub fn decode_payload(kind: MetaKind, data: &[u8]) -> Result<Self> {
        let mut reader = DataStreamReader::new(data);
        let decoded = match &kind {
            MetaKind::UiState => UiState::decode(&mut reader).map(MetaItem::UiState),
            MetaKind::DefaultUsername => {
                payload::decode_text(&mut reader).map(MetaItem::DefaultUsername)
            }
            MetaKind::SearchHistoryItem => {
                payload::decode_text(&mut reader).map(MetaItem::SearchHistoryItem)
            }
            MetaKind::CustomKvp => payload::decode_kvp(&mut reader).map(MetaItem::CustomKvp),
            MetaKind::DatabaseColor => Color::decode(&mut reader).map(MetaItem::DatabaseColor),
            MetaKind::CustomIcons(encoding) => {
                CustomIcons::decode(&mut reader).map(|icons| MetaItem::CustomIcons {
                    encoding: *encoding,
                    icons,
                })
            }
            MetaKind::GroupTreeState => {
                payload::decode_group_tree(&mut reader).map(MetaItem::GroupTreeState)
            }
            MetaKind::Unknown(description) => {
                tracing::debug!(description = %description, "unrecognized meta-entry kind");
                Ok(MetaItem::Unknown {
                    description: description.clone(),
                    data: data.to_vec(),
                })
            }
        };

        let item = decoded
            .and_then(|item| {
                let encoded = item.encode_payload()?;
                match first_difference(&encoded, data) {
                    None => Ok(item),
                    Some(location) => Err(Error::NonCanonical { location }),
                }
            })
            .map_err(|source| Error::MalformedMeta {
                kind: kind.description().to_owned(),
                source: Box::new(source),
            })?;

        tracing::debug!(kind = kind.description(), bytes = data.len(), "decoded meta-entry");
        Ok(item)
    }

    /// Binary payload in the legacy layout for this kind.
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let mut writer = DataStreamWriter::new();
        match self {
            MetaItem::UiState(state) => state.encode(&mut writer),
            MetaItem::DefaultUsername(text) | MetaItem::SearchHistoryItem(text) => {
                payload::encode_text(text, &mut writer)?
            }
            MetaItem::CustomKvp(pairs) => payload::encode_kvp(pairs, &mut writer)?,
            MetaItem::DatabaseColor(color) => color.encode(&mut writer),
            MetaItem::CustomIcons { icons, .. } => icons.encode(&mut writer),
            MetaItem::GroupTreeState(items) => payload::encode_group_tree(items, &mut writer),
            MetaItem::Unknown { data, .. } => writer.write_bytes(data),
        }
        Ok(writer.into_data())
    }

    /// Build the sentinel-tagged entry that stores this item in a KDB file.
    pub fn to_entry(&self) -> Result<Entry> {
        let payload = self.encode_payload()?;
        Ok(EntryBuilder::new()
            .title(META_ENTRY_TITLE)
            .username(META_ENTRY_USERNAME)
            .url(META_ENTRY_URL)
            .notes(self.kind().description())
            .binary(Binary::shared(META_ENTRY_BINARY_DESCRIPTION, payload))
            .build())
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    if a == b {
        return None;
    }
    let common = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    Some(common)
}

/// Kind description and payload of a meta-entry.
fn meta_parts(entry: &Entry) -> Option<(&str, &[u8])> {
    if !is_meta_entry(entry) {
        return None;
    }
    let description = entry.notes().unwrap_or_default();
    let data = entry.binaries().first()?.data.as_slice();
    Some((description, data))
}

/// Separate credential entries from meta-entries read out of a KDB file.
///
/// Meta-entries that cannot be decoded stay in the credential list when
/// `config.lossless_meta` is off, and become [`MetaItem::Unknown`] when it is
/// on. Either way nothing is dropped.
pub fn split_meta_entries(entries: Vec<Entry>, config: &Config) -> (Vec<Entry>, Vec<MetaItem>) {
    let mut credentials = Vec::with_capacity(entries.len());
    let mut items = Vec::new();

    for entry in entries {
        if !entry.is_meta() {
            credentials.push(entry);
            continue;
        }
        if config.lossless_meta {
            items.extend(MetaItem::decode_lossless(&entry));
            continue;
        }
        match MetaItem::decode(&entry) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => credentials.push(entry),
            Err(err) => {
                tracing::warn!(%err, uuid = %entry.id(), "treating undecodable meta-entry as a regular entry");
                credentials.push(entry);
            }
        }
    }

    tracing::debug!(
        credentials = credentials.len(),
        meta = items.len(),
        "split legacy entries"
    );
    (credentials, items)
}
