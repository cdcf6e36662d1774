//! The immutable snapshot payload.
//!
//! A [`Snapshot`] is the serialized game state produced by the host each
//! tick. The broadcast pipeline never looks inside it. Payloads travel as
//! WebSocket text frames, so construction validates UTF-8 once and every
//! later clone is a reference-count bump on the same bytes.

use std::sync::Arc;

use serde::Serialize;

/// Errors that can occur when building a snapshot payload.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The payload bytes are not valid UTF-8 and cannot be sent as text.
    #[error("payload is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// The underlying conversion error.
        #[from]
        source: std::string::FromUtf8Error,
    },

    /// The state could not be serialized to JSON.
    #[error("failed to encode snapshot as JSON: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// An opaque, immutable, cheaply clonable serialized state payload.
///
/// Clones share the same allocation; nothing can mutate the bytes after
/// construction, so a sender holding a clone never observes a torn write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    /// Build a snapshot from raw bytes, rejecting invalid UTF-8.
    pub fn from_utf8(bytes: Vec<u8>) -> Result<Self, SnapshotError> {
        let text = String::from_utf8(bytes)?;
        Ok(Self::from(text))
    }

    /// Serialize `value` as compact JSON into a new snapshot.
    pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SnapshotError> {
        let text = serde_json::to_string(value)?;
        Ok(Self::from(text))
    }

    /// The payload as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `other` is a clone of this snapshot, sharing its allocation.
    ///
    /// Equal text built separately is not the same payload.
    pub fn same_payload(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<String> for Snapshot {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl From<&str> for Snapshot {
    fn from(text: &str) -> Self {
        Self(Arc::from(text))
    }
}

impl AsRef<[u8]> for Snapshot {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
