//! Error types for the parameter server binary.
//!
//! [`AppError`] is the top-level error that `main` turns into an exit
//! status.

use param_core::ServerError;

/// Top-level error for the parameter server binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Loading or publishing the parameters failed.
    #[error("{source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },

    /// NATS connection or subscription failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },
}
