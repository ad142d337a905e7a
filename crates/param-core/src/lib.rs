//! Core of the parameter server: state machine, bus seam and event loop.
//!
//! A parameter server holds one hierarchical parameter tree, republishes it
//! on a fixed period and on request, and applies remote set requests,
//! republishing after every accepted entry.
//!
//! # Modules
//!
//! - [`server`] -- [`ParameterServer`] and the [`ServerEvent`] rules.
//! - [`publish`] -- [`UpdatePublisher`] trait and [`RecordingPublisher`].
//! - [`event_loop`] -- [`run_event_loop`], the single-task driver.
//! - [`error`] -- Fatal [`ServerError`]s.
//!
//! [`ParameterServer`]: server::ParameterServer
//! [`ServerEvent`]: server::ServerEvent
//! [`UpdatePublisher`]: publish::UpdatePublisher
//! [`RecordingPublisher`]: publish::RecordingPublisher
//! [`run_event_loop`]: event_loop::run_event_loop
//! [`ServerError`]: error::ServerError

pub mod error;
pub mod event_loop;
pub mod publish;
pub mod server;

pub use error::ServerError;
pub use event_loop::{DEFAULT_PUBLISH_PERIOD, EventLoopStats, run_event_loop};
pub use publish::{BusError, RecordingPublisher, UpdatePublisher};
pub use server::{EventKind, EventReport, ParameterServer, ServerEvent};
