//! Error types for kdbkit-core.

use crate::io::TextEncoding;
use thiserror::Error;

/// Result type alias for kdbkit-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding or encoding database fields.
///
/// The entry model itself has no failure modes; everything here comes from
/// untrusted bytes or from values that cannot be represented in a legacy format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read asked for more bytes than remain in the buffer.
    #[error("read of {requested} bytes at offset {location} exceeds the {remaining} remaining")]
    OutOfBounds {
        requested: usize,
        remaining: usize,
        location: usize,
    },

    /// Bytes are not valid text under the requested encoding.
    #[error("invalid {encoding} text at offset {location}: {reason}")]
    Decoding {
        encoding: TextEncoding,
        location: usize,
        reason: String,
    },

    /// A character cannot be represented in the requested encoding.
    #[error("character {character:?} cannot be encoded as {encoding}")]
    Encoding {
        encoding: TextEncoding,
        character: char,
    },

    /// Bytes decode, but writing the decoded value back would not reproduce them.
    #[error("payload does not re-encode identically, first difference at offset {location}")]
    NonCanonical { location: usize },

    /// A meta-entry of a known kind carries a payload that does not decode.
    #[error("malformed '{kind}' meta-entry payload: {source}")]
    MalformedMeta {
        kind: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether the error was caused by running out of input.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Error::OutOfBounds { .. })
    }
}
