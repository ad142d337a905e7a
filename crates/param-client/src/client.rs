//! NATS client for a parameter server.
//!
//! [`ParamClient`] speaks the same three channels as the server, derived from
//! the same name prefix. It can ask for a snapshot, push set requests, and
//! stream snapshots as they are published.

use std::time::Duration;

use futures::future::ready;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt as _};
use param_types::{ChannelNames, ParamRequest, ParamSet, ParamUpdate, SetEntry, decode, encode};
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// A connection to the parameter server's channels.
pub struct ParamClient {
    client: async_nats::Client,
    channels: ChannelNames,
}

impl ParamClient {
    /// Connect to a NATS server and address the server named by `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Nats`] if the connection fails.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, ClientError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| ClientError::Nats {
                message: format!("failed to connect to NATS at {url}: {e}"),
            })?;
        let channels = ChannelNames::with_prefix(prefix);
        info!(
            url = url,
            update_channel = channels.update,
            "param client connected"
        );
        Ok(Self { client, channels })
    }

    /// The channels this client talks on.
    pub const fn channels(&self) -> &ChannelNames {
        &self.channels
    }

    /// Ask the server to republish its parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be encoded or sent.
    pub async fn request(&self) -> Result<(), ClientError> {
        let payload = encode(&ParamRequest::now())?;
        self.publish(&self.channels.request, payload).await
    }

    /// Send a batch of set entries in one message.
    ///
    /// The server applies entries in order and republishes after each one
    /// it accepts; rejected entries are only visible in its log.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded or sent.
    pub async fn set(&self, entries: Vec<SetEntry>) -> Result<(), ClientError> {
        let count = entries.len();
        let payload = encode(&ParamSet::now(entries))?;
        self.publish(&self.channels.set, payload).await?;
        debug!(entries = count, "sent param set");
        Ok(())
    }

    /// Stream every snapshot published on the update channel.
    ///
    /// Undecodable payloads are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Nats`] if the subscription fails.
    pub async fn subscribe_updates(&self) -> Result<BoxStream<'static, ParamUpdate>, ClientError> {
        let subject = self.channels.update.clone();
        let subscriber =
            self.client
                .subscribe(subject.clone())
                .await
                .map_err(|e| ClientError::Nats {
                    message: format!("failed to subscribe to {subject}: {e}"),
                })?;
        Ok(subscriber
            .filter_map(|msg| ready(decode_update(&msg.payload)))
            .boxed())
    }

    /// Request a snapshot and wait for the next one to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if nothing arrives within `timeout`,
    /// or a transport error if the request cannot be sent.
    pub async fn fetch(&self, timeout: Duration) -> Result<ParamUpdate, ClientError> {
        // Subscribe first so the reply to our own request is not missed.
        let mut updates = self.subscribe_updates().await?;
        self.request().await?;
        self.flush().await?;
        first_update(&mut updates, timeout).await
    }

    /// Flush all pending messages to the NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Nats`] if the flush fails.
    pub async fn flush(&self) -> Result<(), ClientError> {
        self.client.flush().await.map_err(|e| ClientError::Nats {
            message: format!("flush failed: {e}"),
        })
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        self.client
            .publish(subject.to_owned(), payload.into())
            .await
            .map_err(|e| ClientError::Nats {
                message: format!("failed to publish to {subject}: {e}"),
            })
    }
}

impl std::fmt::Debug for ParamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamClient")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// Wait for the first snapshot on `updates`.
///
/// # Errors
///
/// Returns [`ClientError::Timeout`] if the stream yields nothing within
/// `timeout` or ends first.
pub async fn first_update<S>(updates: &mut S, timeout: Duration) -> Result<ParamUpdate, ClientError>
where
    S: Stream<Item = ParamUpdate> + Unpin,
{
    match tokio::time::timeout(timeout, updates.next()).await {
        Ok(Some(update)) => Ok(update),
        Ok(None) | Err(_) => Err(ClientError::Timeout {
            waited_ms: timeout.as_millis(),
        }),
    }
}

fn decode_update(payload: &[u8]) -> Option<ParamUpdate> {
    match decode::<ParamUpdate>(payload) {
        Ok(update) => Some(update),
        Err(e) => {
            warn!(error = %e, "skipping malformed param update");
            None
        }
    }
}
