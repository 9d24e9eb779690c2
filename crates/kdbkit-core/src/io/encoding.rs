//! Character encodings understood by the stream reader and writer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text encodings found in KDB and KDBX payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Ascii,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Ascii => "ASCII",
            TextEncoding::Latin1 => "ISO-8859-1",
        };
        f.write_str(name)
    }
}

impl TextEncoding {
    /// Decode `bytes` as text. `location` is only used for error reporting.
    pub fn decode(self, bytes: &[u8], location: usize) -> Result<String> {
        let fail = |reason: String| Error::Decoding {
            encoding: self,
            location,
            reason,
        };

        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| fail(e.to_string())),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(fail(format!("odd byte count {}", bytes.len())));
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if self == TextEncoding::Utf16Le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                });
                char::decode_utf16(units)
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|e| fail(e.to_string()))
            }
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(fail(format!(
                    "non-ASCII byte {:#04x} at index {}",
                    bytes[pos], pos
                ))),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Encode `text`, failing on the first character the encoding cannot hold.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Ascii | TextEncoding::Latin1 => {
                let limit = if self == TextEncoding::Ascii { 0x7f } else { 0xff };
                text.chars()
                    .map(|c| {
                        if (c as u32) <= limit {
                            Ok(c as u8)
                        } else {
                            Err(Error::Encoding {
                                encoding: self,
                                character: c,
                            })
                        }
                    })
                    .collect()
            }
        }
    }

    /// Width of one code unit in bytes; used to find terminators.
    pub fn unit_width(self) -> usize {
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
            _ => 1,
        }
    }
}
