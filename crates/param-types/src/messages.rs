//! Messages exchanged on the three parameter channels.
//!
//! All messages travel as JSON. [`encode`] and [`decode`] are the only
//! serialization entry points so every producer and consumer agrees on the
//! format.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::{SequenceNumber, ServerId};

/// A full snapshot of a server's parameters, published on the update
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamUpdate {
    /// The entire parameter tree in its serialized text form.
    pub params: String,
    /// When the snapshot was captured.
    pub captured_at: DateTime<Utc>,
    /// Identity of the publishing server.
    pub server_id: ServerId,
    /// The publishing server's sequence number at capture time.
    pub sequence_number: SequenceNumber,
}

/// Ask every server on the request channel to publish a snapshot now.
///
/// The server never looks at the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRequest {
    /// When the request was sent.
    pub sent_at: DateTime<Utc>,
}

impl ParamRequest {
    /// A request stamped with the current time.
    pub fn now() -> Self {
        Self { sent_at: Utc::now() }
    }
}

/// One key/value assignment inside a [`ParamSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEntry {
    /// Dotted key of an existing parameter.
    pub key: String,
    /// New value in text form.
    pub value: String,
}

impl SetEntry {
    /// Build an entry from anything string-like.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered batch of assignments, published on the set channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSet {
    /// When the request was sent.
    pub sent_at: DateTime<Utc>,
    /// Assignments, applied strictly in this order.
    pub entries: Vec<SetEntry>,
}

impl ParamSet {
    /// A set request stamped with the current time.
    pub fn now(entries: Vec<SetEntry>) -> Self {
        Self {
            sent_at: Utc::now(),
            entries,
        }
    }
}

/// Failure to encode or decode a bus message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The message could not be serialized.
    #[error("failed to encode message: {source}")]
    Encode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The payload is not a valid message of the expected type.
    #[error("failed to decode message: {source}")]
    Decode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Serialize a message into a bus payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|source| CodecError::Encode { source })
}

/// Deserialize a bus payload into a message.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(payload).map_err(|source| CodecError::Decode { source })
}
