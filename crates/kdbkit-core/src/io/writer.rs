//! Little-endian writer, the counterpart of [`DataStreamReader`](super::DataStreamReader).

use crate::error::Result;
use crate::io::TextEncoding;
use byteorder::{ByteOrder, LittleEndian};
use std::mem::size_of;
use uuid::Uuid;

/// Growable output buffer for legacy payloads.
#[derive(Debug, Clone, Default)]
pub struct DataStreamWriter {
    data: Vec<u8>,
}

impl DataStreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_usize(&mut self, value: usize) {
        let mut buf = [0u8; size_of::<usize>()];
        LittleEndian::write_uint(&mut buf, value as u64, size_of::<usize>());
        self.data.extend_from_slice(&buf);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_uuid(&mut self, uuid: &Uuid) {
        self.data.extend_from_slice(uuid.as_bytes());
    }

    /// Write `text` without terminator or length prefix. Returns the byte count.
    pub fn write_string(&mut self, text: &str, encoding: TextEncoding) -> Result<usize> {
        let bytes = encoding.encode(text)?;
        self.data.extend_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Write `text` followed by a NUL code unit.
    pub fn write_c_string(&mut self, text: &str, encoding: TextEncoding) -> Result<usize> {
        let written = self.write_string(text, encoding)?;
        let width = encoding.unit_width();
        self.data.extend(std::iter::repeat(0u8).take(width));
        Ok(written + width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
