//! Decode KDB-style entry records end to end: field stream, entry model,
//! meta-entry routing and attachment to a group.

use kdbkit_core::meta::{
    Color, GroupTreeItem, UiState, META_ENTRY_BINARY_DESCRIPTION, META_ENTRY_TITLE,
};
use kdbkit_core::{
    split_meta_entries, Binary, Config, DataStreamReader, DataStreamWriter, Entry, Group,
    MetaItem, NodeId, Result, TextEncoding,
};
use uuid::Uuid;

const FIELD_UUID: u16 = 0x0001;
const FIELD_TITLE: u16 = 0x0004;
const FIELD_URL: u16 = 0x0005;
const FIELD_USERNAME: u16 = 0x0006;
const FIELD_PASSWORD: u16 = 0x0007;
const FIELD_NOTES: u16 = 0x0008;
const FIELD_BINARY_DESC: u16 = 0x000D;
const FIELD_BINARY_DATA: u16 = 0x000E;
const FIELD_END: u16 = 0xFFFF;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kdbkit_core=debug")
        .with_test_writer()
        .try_init();
}

fn write_field(writer: &mut DataStreamWriter, field: u16, data: &[u8]) {
    writer.write_u16(field);
    writer.write_u32(data.len() as u32);
    writer.write_bytes(data);
}

fn write_text_field(writer: &mut DataStreamWriter, field: u16, text: &str) {
    let mut value = DataStreamWriter::new();
    value.write_c_string(text, TextEncoding::Utf8).unwrap();
    write_field(writer, field, value.as_slice());
}

fn write_entry(writer: &mut DataStreamWriter, entry: &Entry) {
    write_field(writer, FIELD_UUID, entry.id().as_uuid().as_bytes());
    let text = [
        (FIELD_TITLE, entry.title()),
        (FIELD_URL, entry.url()),
        (FIELD_USERNAME, entry.username()),
        (FIELD_PASSWORD, entry.password()),
        (FIELD_NOTES, entry.notes()),
    ];
    for (field, value) in text {
        write_text_field(writer, field, value.unwrap_or_default());
    }
    if let Some(binary) = entry.binaries().first() {
        write_text_field(writer, FIELD_BINARY_DESC, &binary.name);
        write_field(writer, FIELD_BINARY_DATA, &binary.data);
    }
    write_field(writer, FIELD_END, &[]);
}

/// Minimal KDB entry record parser, as a container collaborator would write it.
fn read_entries(data: &[u8], encoding: TextEncoding) -> Result<Vec<Entry>> {
    let mut reader = DataStreamReader::new(data);
    let mut entries = Vec::new();

    while !reader.end_of_data() {
        let mut entry = Entry::new();
        let mut binary_name = String::new();
        loop {
            let field = reader.read_u16()?;
            let size = reader.read_u32()? as usize;
            match field {
                FIELD_UUID => entry = Entry::with_uuid(NodeId::from_uuid(reader.read_uuid()?)),
                FIELD_TITLE => entry.set_title(reader.read_c_string(size, encoding)?),
                FIELD_URL => entry.set_url(reader.read_c_string(size, encoding)?),
                FIELD_USERNAME => entry.set_username(reader.read_c_string(size, encoding)?),
                FIELD_PASSWORD => entry.set_password(reader.read_c_string(size, encoding)?),
                FIELD_NOTES => entry.set_notes(reader.read_c_string(size, encoding)?),
                FIELD_BINARY_DESC => binary_name = reader.read_c_string(size, encoding)?,
                FIELD_BINARY_DATA => {
                    let content = reader.data_with_length(size)?;
                    entry.add_binary(Binary::shared(binary_name.clone(), content));
                }
                FIELD_END => break,
                _ => reader.skip_bytes(size)?,
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn credential(title: &str) -> Entry {
    let mut entry = Entry::new();
    entry.set_title(title);
    entry.set_username("alice");
    entry.set_password("correct horse");
    entry.set_url("https://example.com");
    entry.set_notes("");
    entry
}

#[test]
fn test_legacy_stream_splits_into_credentials_and_metadata() {
    init_tracing();

    let ui_state = MetaItem::UiState(UiState {
        last_selected_group: 2,
        last_top_visible_group: 1,
        last_selected_entry: Uuid::new_v4(),
        last_top_visible_entry: Uuid::nil(),
        reserved: vec![0; 8],
    });
    let color = MetaItem::DatabaseColor(Color::new(0x33, 0x66, 0x99));
    let tree = MetaItem::GroupTreeState(vec![
        GroupTreeItem {
            group: 1,
            expanded: true,
        },
        GroupTreeItem {
            group: 2,
            expanded: false,
        },
    ]);
    let kvp = MetaItem::CustomKvp(vec![
        ("plugin.sync".into(), "on".into()),
        ("théme".into(), "".into()),
    ]);
    let opaque = MetaItem::Unknown {
        description: "KPX_FUTURE_EXTENSION".into(),
        data: vec![0xde, 0xad],
    };

    let originals = vec![
        credential("Mail"),
        ui_state.to_entry().unwrap(),
        credential("Bank"),
        color.to_entry().unwrap(),
        tree.to_entry().unwrap(),
        kvp.to_entry().unwrap(),
        opaque.to_entry().unwrap(),
    ];

    let mut writer = DataStreamWriter::new();
    for entry in &originals {
        write_entry(&mut writer, entry);
    }
    let data = writer.into_data();

    let config = Config::default();
    let entries = read_entries(&data, config.legacy_text_encoding).unwrap();
    assert_eq!(entries.len(), originals.len());
    for (read, original) in entries.iter().zip(&originals) {
        assert_eq!(read.id(), original.id());
        assert_eq!(read.is_meta(), original.is_meta());
    }

    let (credentials, items) = split_meta_entries(entries, &config);
    let titles: Vec<_> = credentials.iter().map(|e| e.title().unwrap()).collect();
    assert_eq!(titles, vec!["Mail", "Bank"]);
    assert_eq!(credentials[0].password(), Some("correct horse"));
    assert_eq!(items, vec![ui_state, color, tree, kvp, opaque]);

    let mut root = Group::new("Root");
    for entry in credentials {
        root.add_entry(entry).unwrap();
    }
    assert!(root.all_entries().iter().all(|e| e.parent() == Some(root.id())));
}

#[test]
fn test_truncated_stream_reports_out_of_bounds() {
    let mut writer = DataStreamWriter::new();
    write_entry(&mut writer, &credential("Mail"));
    let data = writer.into_data();

    for cut in [1, 7, data.len() / 2, data.len() - 1] {
        let err = read_entries(&data[..cut], TextEncoding::Utf8).unwrap_err();
        assert!(err.is_out_of_bounds(), "cut at {}: {}", cut, err);
    }
}

#[test]
fn test_meta_entry_with_extra_attachment_stays_a_credential() {
    let mut entry = MetaItem::SearchHistoryItem("github".into())
        .to_entry()
        .unwrap();
    assert!(entry.is_meta());
    assert_eq!(entry.title(), Some(META_ENTRY_TITLE));
    assert_eq!(entry.binaries()[0].name, META_ENTRY_BINARY_DESCRIPTION);

    entry.add_binary(Binary::shared("notes.txt", b"hello".to_vec()));
    let (credentials, items) = split_meta_entries(vec![entry], &Config::default());
    assert_eq!(credentials.len(), 1);
    assert!(items.is_empty());
}
