//! Error types for the parameter server core.
//!
//! Every variant here is fatal: the caller is expected to log it and stop
//! the process. Recoverable conditions (a rejected set entry, a failed
//! publish, a second server on the bus) never surface as errors.

use param_store::StoreError;

/// Fatal errors raised by the parameter server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The parameter file could not be loaded at startup.
    #[error("could not load params from {path}: {source}")]
    Load {
        /// Path of the parameter file.
        path: String,
        /// The underlying store error.
        source: StoreError,
    },

    /// The in-memory parameters could not be serialized for a snapshot.
    #[error("could not write params to string: {source}")]
    Snapshot {
        /// The underlying store error.
        source: StoreError,
    },
}
