//! Client side of the parameter server protocol.
//!
//! # Modules
//!
//! - [`cache`] -- [`ParamCache`], which keeps the newest snapshot and
//!   notices when a different server takes over.
//! - [`client`] -- [`ParamClient`], a NATS connection that requests,
//!   sets and streams parameters.
//! - [`error`] -- [`ClientError`].

pub mod cache;
pub mod client;
pub mod error;

pub use cache::{CacheOutcome, ParamCache};
pub use client::{ParamClient, first_update};
pub use error::ClientError;
