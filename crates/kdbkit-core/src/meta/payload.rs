//! Typed payloads carried by legacy meta-entries and their binary layouts.

use crate::error::Result;
use crate::io::{DataStreamReader, DataStreamWriter, TextEncoding};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Meta-stream text is always UTF-8, whatever the entry text encoding.
const META_TEXT: TextEncoding = TextEncoding::Utf8;

/// Upper bound for pre-allocation from an untrusted element count.
fn capped_capacity(count: u32, reader: &DataStreamReader<'_>, min_item_size: usize) -> usize {
    (count as usize).min(reader.count_of_readable_bytes() / min_item_size.max(1))
}

/// Window and selection state saved by KeePass 1.x.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiState {
    pub last_selected_group: u32,
    pub last_top_visible_group: u32,
    pub last_selected_entry: Uuid,
    pub last_top_visible_entry: Uuid,
    /// Reserved tail of the record, kept as found.
    pub reserved: Vec<u8>,
}

impl UiState {
    pub(crate) fn decode(reader: &mut DataStreamReader<'_>) -> Result<Self> {
        Ok(Self {
            last_selected_group: reader.read_u32()?,
            last_top_visible_group: reader.read_u32()?,
            last_selected_entry: reader.read_uuid()?,
            last_top_visible_entry: reader.read_uuid()?,
            reserved: reader.remaining_data(),
        })
    }

    pub(crate) fn encode(&self, writer: &mut DataStreamWriter) {
        writer.write_u32(self.last_selected_group);
        writer.write_u32(self.last_top_visible_group);
        writer.write_uuid(&self.last_selected_entry);
        writer.write_uuid(&self.last_top_visible_entry);
        writer.write_bytes(&self.reserved);
    }
}

pub(crate) fn decode_text(reader: &mut DataStreamReader<'_>) -> Result<String> {
    let len = reader.count_of_readable_bytes();
    reader.read_c_string(len, META_TEXT)
}

pub(crate) fn encode_text(text: &str, writer: &mut DataStreamWriter) -> Result<()> {
    writer.write_c_string(text, META_TEXT).map(|_| ())
}

/// `key NUL value NUL`, repeated.
pub(crate) fn decode_kvp(reader: &mut DataStreamReader<'_>) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    while !reader.end_of_data() {
        let key = reader.read_terminated_string(META_TEXT)?;
        let value = reader.read_terminated_string(META_TEXT)?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

pub(crate) fn encode_kvp(pairs: &[(String, String)], writer: &mut DataStreamWriter) -> Result<()> {
    for (key, value) in pairs {
        writer.write_c_string(key, META_TEXT)?;
        writer.write_c_string(value, META_TEXT)?;
    }
    Ok(())
}

/// An RGB color stored as a Windows COLORREF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#RRGGBB`, the form KDBX keeps in its `Color` meta field.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub(crate) fn decode(reader: &mut DataStreamReader<'_>) -> Result<Self> {
        let mut raw = [0u8; 4];
        reader.read_bytes(&mut raw)?;
        Ok(Self::new(raw[0], raw[1], raw[2]))
    }

    pub(crate) fn encode(&self, writer: &mut DataStreamWriter) {
        writer.write_bytes(&[self.r, self.g, self.b, 0]);
    }
}

/// Custom icon of an entry, by legacy entry UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryIcon {
    pub entry: Uuid,
    pub icon: u32,
}

/// Custom icon of a group, by legacy numeric group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIcon {
    pub group: u32,
    pub icon: u32,
}

/// KeePassX custom icon table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomIcons {
    /// Raw PNG data, indexed by the `icon` fields below.
    pub icons: Vec<Vec<u8>>,
    pub entries: Vec<EntryIcon>,
    pub groups: Vec<GroupIcon>,
}

impl CustomIcons {
    pub(crate) fn decode(reader: &mut DataStreamReader<'_>) -> Result<Self> {
        let icon_count = reader.read_u32()?;
        let entry_count = reader.read_u32()?;
        let group_count = reader.read_u32()?;

        let mut icons = Vec::with_capacity(capped_capacity(icon_count, reader, 4));
        for _ in 0..icon_count {
            let len = reader.read_u32()? as usize;
            icons.push(reader.data_with_length(len)?);
        }

        let mut entries = Vec::with_capacity(capped_capacity(entry_count, reader, 20));
        for _ in 0..entry_count {
            entries.push(EntryIcon {
                entry: reader.read_uuid()?,
                icon: reader.read_u32()?,
            });
        }

        let mut groups = Vec::with_capacity(capped_capacity(group_count, reader, 8));
        for _ in 0..group_count {
            groups.push(GroupIcon {
                group: reader.read_u32()?,
                icon: reader.read_u32()?,
            });
        }

        Ok(Self {
            icons,
            entries,
            groups,
        })
    }

    pub(crate) fn encode(&self, writer: &mut DataStreamWriter) {
        writer.write_u32(self.icons.len() as u32);
        writer.write_u32(self.entries.len() as u32);
        writer.write_u32(self.groups.len() as u32);
        for icon in &self.icons {
            writer.write_u32(icon.len() as u32);
            writer.write_bytes(icon);
        }
        for mapping in &self.entries {
            writer.write_uuid(&mapping.entry);
            writer.write_u32(mapping.icon);
        }
        for mapping in &self.groups {
            writer.write_u32(mapping.group);
            writer.write_u32(mapping.icon);
        }
    }
}

/// Expanded/collapsed flag of one group in the KeePassX tree view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTreeItem {
    pub group: u32,
    pub expanded: bool,
}

pub(crate) fn decode_group_tree(reader: &mut DataStreamReader<'_>) -> Result<Vec<GroupTreeItem>> {
    let count = reader.read_u32()?;
    let mut items = Vec::with_capacity(capped_capacity(count, reader, 5));
    for _ in 0..count {
        items.push(GroupTreeItem {
            group: reader.read_u32()?,
            expanded: reader.read_u8()? != 0,
        });
    }
    Ok(items)
}

pub(crate) fn encode_group_tree(items: &[GroupTreeItem], writer: &mut DataStreamWriter) {
    writer.write_u32(items.len() as u32);
    for item in items {
        writer.write_u32(item.group);
        writer.write_u8(u8::from(item.expanded));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        let color = Color::new(0x12, 0xab, 0x00);
        assert_eq!(color.to_hex(), "#12AB00");
        assert_eq!(Color::from_hex("#12ab00"), Some(color));
        assert_eq!(Color::from_hex("12AB00"), Some(color));
        assert_eq!(Color::from_hex("#12AB0"), None);
        assert_eq!(Color::from_hex("#12AB0G"), None);
        assert_eq!(Color::from_hex("#ééé"), None);
    }

    #[test]
    fn test_color_is_colorref() {
        let mut writer = DataStreamWriter::new();
        Color::new(1, 2, 3).encode(&mut writer);
        assert_eq!(writer.as_slice(), &[1, 2, 3, 0]);
    }

    #[test]
    fn test_huge_icon_count_does_not_preallocate() {
        let mut writer = DataStreamWriter::new();
        writer.write_u32(u32::MAX);
        writer.write_u32(0);
        writer.write_u32(0);
        let data = writer.into_data();
        let mut reader = DataStreamReader::new(&data);
        assert!(CustomIcons::decode(&mut reader)
            .unwrap_err()
            .is_out_of_bounds());
    }

    #[test]
    fn test_kvp_requires_terminators() {
        let mut reader = DataStreamReader::new(b"k\0v\0");
        assert_eq!(
            decode_kvp(&mut reader).unwrap(),
            vec![("k".to_string(), "v".to_string())]
        );

        let mut reader = DataStreamReader::new(b"k\0v");
        assert!(decode_kvp(&mut reader).is_err());
    }
}
