//! Custom key/value attributes attached to entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Handle identifying one attribute instance.
///
/// Two attributes with equal keys and values are still different attributes;
/// removal goes through this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeId(Uuid);

impl AttributeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttributeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A string that is zeroed on drop
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct ProtectedString(String);

impl ProtectedString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedString(***)")
    }
}

impl From<&str> for ProtectedString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProtectedString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for ProtectedString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Plain text; the container layer applies its own stream cipher.
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProtectedString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(ProtectedString)
    }
}

/// Attribute value, either plain or held in zeroize-on-drop storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Plain(String),
    Protected(ProtectedString),
}

impl Value {
    pub fn as_str(&self) -> &str {
        match self {
            Value::Plain(s) => s,
            Value::Protected(s) => s.as_str(),
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Value::Protected(_))
    }
}

/// A single custom attribute of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(skip, default)]
    id: AttributeId,
    key: String,
    value: Value,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: AttributeId::new(),
            key: key.into(),
            value: Value::Plain(value.into()),
        }
    }

    /// Create an attribute whose value is kept in protected memory.
    pub fn protected(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: AttributeId::new(),
            key: key.into(),
            value: Value::Protected(ProtectedString::new(value)),
        }
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = if self.is_protected() {
            Value::Protected(ProtectedString::new(value))
        } else {
            Value::Plain(value.into())
        };
    }

    pub fn is_protected(&self) -> bool {
        self.value.is_protected()
    }

    /// Move the value in or out of protected storage.
    pub fn set_protected(&mut self, protected: bool) {
        if protected == self.is_protected() {
            return;
        }
        let current = std::mem::replace(&mut self.value, Value::Plain(String::new()));
        self.value = match current {
            Value::Plain(mut s) => {
                let value = Value::Protected(ProtectedString::new(s.as_str()));
                s.zeroize();
                value
            }
            Value::Protected(s) => Value::Plain(s.as_str().to_owned()),
        };
    }

    /// Whether key, value and protection match, ignoring identity.
    pub fn same_content(&self, other: &Attribute) -> bool {
        self.key == other.key && self.value == other.value
    }
}
