//! Error types for the parameter client.

use param_store::StoreError;
use param_types::CodecError;

/// Errors that can occur while talking to a parameter server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to connect to or communicate with the NATS server.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the failure.
        message: String,
    },

    /// A message could not be encoded or decoded.
    #[error("codec error: {source}")]
    Codec {
        /// The underlying codec error.
        #[from]
        source: CodecError,
    },

    /// A snapshot carried parameters that do not parse.
    #[error("snapshot error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// No snapshot arrived in time.
    #[error("no parameter update received within {waited_ms}ms")]
    Timeout {
        /// How long the client waited.
        waited_ms: u128,
    },
}
