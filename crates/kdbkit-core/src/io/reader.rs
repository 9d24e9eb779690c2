//! Sequential little-endian reader over an in-memory payload.

use crate::error::{Error, Result};
use crate::io::TextEncoding;
use byteorder::{ByteOrder, LittleEndian};
use std::mem::size_of;
use uuid::Uuid;

/// Cursor over a decrypted, decompressed database payload.
///
/// Every read is bounds checked and atomic: it either consumes exactly the
/// bytes it needs or fails and leaves [`location`](Self::location) untouched,
/// so a caller can try another decoding path without rewinding by hand.
///
/// The reader borrows its buffer. Give each thread its own reader over a
/// shared slice instead of sharing one reader.
#[derive(Debug, Clone)]
pub struct DataStreamReader<'a> {
    data: &'a [u8],
    location: usize,
}

impl<'a> DataStreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, location: 0 }
    }

    /// Borrow the next `length` bytes without consuming them.
    fn peek(&self, length: usize) -> Result<&'a [u8]> {
        let remaining = self.count_of_readable_bytes();
        if length > remaining {
            tracing::debug!(
                requested = length,
                remaining,
                location = self.location,
                "read past end of stream"
            );
            return Err(Error::OutOfBounds {
                requested: length,
                remaining,
                location: self.location,
            });
        }
        Ok(&self.data[self.location..self.location + length])
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(length)?;
        self.location += length;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }

    /// Read a platform-width unsigned integer, as used for length prefixes.
    pub fn read_usize(&mut self) -> Result<usize> {
        self.take(size_of::<usize>())
            .map(|bytes| LittleEndian::read_uint(bytes, size_of::<usize>()) as usize)
    }

    /// Fill `buffer` completely from the stream.
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<()> {
        let bytes = self.take(buffer.len())?;
        buffer.copy_from_slice(bytes);
        Ok(())
    }

    /// Copy the next `length` bytes into a new buffer.
    pub fn data_with_length(&mut self, length: usize) -> Result<Vec<u8>> {
        self.take(length).map(<[u8]>::to_vec)
    }

    /// Decode the next `length` bytes as text.
    ///
    /// The cursor only moves when decoding succeeds.
    pub fn string_with_length(&mut self, length: usize, encoding: TextEncoding) -> Result<String> {
        let bytes = self.peek(length)?;
        let text = encoding.decode(bytes, self.location)?;
        self.location += length;
        Ok(text)
    }

    /// Decode a NUL-terminated string stored in a fixed window of `length` bytes.
    ///
    /// The whole window is consumed. Text after the first terminator is ignored;
    /// a window without terminator is decoded in full.
    pub fn read_c_string(&mut self, length: usize, encoding: TextEncoding) -> Result<String> {
        let window = self.peek(length)?;
        let width = encoding.unit_width();
        let end = window
            .chunks(width)
            .position(|unit| unit.len() == width && unit.iter().all(|&b| b == 0))
            .map(|units| units * width)
            .unwrap_or(length);
        let text = encoding.decode(&window[..end], self.location)?;
        self.location += length;
        Ok(text)
    }

    /// Decode a NUL-terminated string of unknown length, consuming the terminator.
    ///
    /// Fails with `OutOfBounds` when no terminator follows the cursor.
    pub fn read_terminated_string(&mut self, encoding: TextEncoding) -> Result<String> {
        let rest = &self.data[self.location..];
        let width = encoding.unit_width();
        let end = rest
            .chunks_exact(width)
            .position(|unit| unit.iter().all(|&b| b == 0))
            .map(|units| units * width)
            .ok_or(Error::OutOfBounds {
                requested: rest.len() + width,
                remaining: rest.len(),
                location: self.location,
            })?;
        let text = encoding.decode(&rest[..end], self.location)?;
        self.location += end + width;
        Ok(text)
    }

    /// Read 16 raw bytes as a UUID.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let mut bytes = [0u8; 16];
        self.read_bytes(&mut bytes)?;
        Ok(Uuid::from_bytes(bytes))
    }

    /// Copy everything after the cursor and move to the end.
    pub fn remaining_data(&mut self) -> Vec<u8> {
        let rest = self.data[self.location..].to_vec();
        self.location = self.data.len();
        rest
    }

    pub fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Zero-based cursor offset.
    pub fn location(&self) -> usize {
        self.location
    }

    pub fn end_of_data(&self) -> bool {
        self.location == self.data.len()
    }

    pub fn count_of_readable_bytes(&self) -> usize {
        self.data.len() - self.location
    }

    pub fn reset(&mut self) {
        self.location = 0;
    }
}
