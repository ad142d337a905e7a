//! Shared type definitions for the parameter server.
//!
//! Both the server and its clients depend on this crate, so it is the single
//! source of truth for what travels on the bus.
//!
//! # Modules
//!
//! - [`ids`] -- Server identity and sequence number newtypes
//! - [`channels`] -- Channel suffix constants and prefix resolution
//! - [`messages`] -- Update, request and set messages plus their codec

pub mod channels;
pub mod ids;
pub mod messages;

pub use channels::{ChannelNames, PARAM_REQUEST, PARAM_SET, PARAM_UPDATE};
pub use ids::{SequenceNumber, ServerId};
pub use messages::{CodecError, ParamRequest, ParamSet, ParamUpdate, SetEntry, decode, encode};
