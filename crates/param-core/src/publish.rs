//! The outbound bus seam.
//!
//! [`UpdatePublisher`] abstracts how a snapshot reaches the update channel.
//! The server binary implements it over NATS; [`RecordingPublisher`] keeps
//! snapshots in memory for tests and dry runs.

use std::future::Future;

use param_types::{CodecError, ParamUpdate};

/// Errors reported by a publisher.
///
/// The server treats all of them as non-fatal: publishing is
/// fire-and-forget and the next timer tick republishes anyway.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The snapshot could not be encoded for the wire.
    #[error("bus codec error: {source}")]
    Codec {
        /// The underlying codec error.
        #[from]
        source: CodecError,
    },

    /// The transport refused or dropped the message.
    #[error("bus transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },
}

/// Something that can put a snapshot on a channel.
pub trait UpdatePublisher {
    /// Send `update` on `channel`.
    ///
    /// Implementations must not wait for any acknowledgement from
    /// subscribers.
    fn publish_update(
        &mut self,
        channel: &str,
        update: &ParamUpdate,
    ) -> impl Future<Output = Result<(), BusError>> + Send;
}

/// A publisher that records every snapshot instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Vec<(String, ParamUpdate)>,
    failures_pending: usize,
}

impl RecordingPublisher {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self {
            published: Vec::new(),
            failures_pending: 0,
        }
    }

    /// Make the next `count` publishes fail with a transport error.
    pub const fn fail_next(&mut self, count: usize) {
        self.failures_pending = count;
    }

    /// Every `(channel, snapshot)` recorded so far, oldest first.
    pub fn published(&self) -> &[(String, ParamUpdate)] {
        &self.published
    }

    /// Just the snapshots, oldest first.
    pub fn updates(&self) -> Vec<&ParamUpdate> {
        self.published.iter().map(|(_, u)| u).collect()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&mut self) -> Vec<(String, ParamUpdate)> {
        std::mem::take(&mut self.published)
    }
}

impl UpdatePublisher for RecordingPublisher {
    async fn publish_update(
        &mut self,
        channel: &str,
        update: &ParamUpdate,
    ) -> Result<(), BusError> {
        if self.failures_pending > 0 {
            self.failures_pending = self.failures_pending.saturating_sub(1);
            return Err(BusError::Transport {
                message: format!("simulated failure on {channel}"),
            });
        }
        self.published.push((channel.to_owned(), update.clone()));
        Ok(())
    }
}
