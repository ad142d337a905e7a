//! Hierarchical key/value store holding a parameter server's configuration.
//!
//! # Modules
//!
//! - [`store`] -- The [`ParamStore`] tree with dotted-key get/set and
//!   full serialization.
//! - [`error`] -- [`StoreError`].

pub mod error;
pub mod store;

pub use error::StoreError;
pub use serde_yml::Value;
pub use store::{KEY_SEPARATOR, ParamStore};
