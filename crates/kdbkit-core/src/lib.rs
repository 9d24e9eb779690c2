//! Core data model and binary decoding for KDB/KDBX password databases.
//!
//! This crate provides the sequential reader that format parsers build on,
//! the entry model with attributes, attachments and history, and the shim that
//! maps legacy KDB meta-entries to typed database metadata.

pub mod attribute;
pub mod binary;
pub mod config;
pub mod entry;
pub mod error;
pub mod group;
pub mod io;
pub mod meta;
pub mod node;

pub use attribute::{Attribute, AttributeId, ProtectedString};
pub use binary::{Binary, BinaryId};
pub use config::Config;
pub use entry::{Entry, EntryBuilder, HistoryId, HistoryItem};
pub use error::{Error, Result};
pub use group::Group;
pub use io::{DataStreamReader, DataStreamWriter, TextEncoding};
pub use meta::{is_meta_entry, split_meta_entries, MetaItem, MetaKind};
pub use node::{Icon, Node, NodeId, Times};
