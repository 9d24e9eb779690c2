//! Byte-level access to decrypted database payloads.

mod encoding;
mod reader;
mod writer;

pub use encoding::TextEncoding;
pub use reader::DataStreamReader;
pub use writer::DataStreamWriter;
