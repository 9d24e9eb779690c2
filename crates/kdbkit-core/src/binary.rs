//! Binary attachments.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Handle identifying one attachment blob across all entries that share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryId(Uuid);

impl BinaryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BinaryId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named blob attached to one or more entries.
///
/// Entries hold attachments as `Arc<Binary>`; attaching or copying an entry
/// never copies the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
    id: BinaryId,
    pub name: String,
    pub data: Vec<u8>,
    /// Keep the content protected in memory (KDBX `Protected` flag).
    #[serde(default)]
    pub protect: bool,
}

impl Binary {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: BinaryId::new(),
            name: name.into(),
            data,
            protect: false,
        }
    }

    /// Create and wrap for sharing in one step.
    pub fn shared(name: impl Into<String>, data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self::new(name, data))
    }

    pub fn id(&self) -> BinaryId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
