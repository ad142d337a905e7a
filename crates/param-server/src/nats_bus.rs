//! NATS transport for the parameter server.
//!
//! The three parameter channels map one-to-one onto NATS subjects. Inbound
//! traffic on the update, request and set subjects is decoded into
//! [`ServerEvent`]s and merged into one stream for the event loop; outbound
//! snapshots go through [`NatsPublisher`].

use futures::StreamExt as _;
use futures::future::ready;
use futures::stream::{self, BoxStream};
use param_core::{BusError, ServerEvent, UpdatePublisher};
use param_types::{ChannelNames, ParamSet, ParamUpdate, decode, encode};
use tracing::{debug, info, warn};

use crate::error::AppError;

/// A connection to the NATS bus.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url).await.map_err(|e| AppError::Nats {
            message: format!("failed to connect to {url}: {e}"),
        })?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Subscribe to the update, request and set subjects and merge them into
    /// one event stream.
    ///
    /// Undecodable update and set payloads are logged and dropped. Any
    /// message on the request subject is a trigger, whatever it contains.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Nats`] if any subscription fails.
    pub async fn subscribe_events(
        &self,
        channels: &ChannelNames,
    ) -> Result<BoxStream<'static, ServerEvent>, AppError> {
        let updates = self
            .subscribe(&channels.update)
            .await?
            .filter_map(|msg| ready(update_event(&msg.payload)));
        let requests = self
            .subscribe(&channels.request)
            .await?
            .map(|_| ServerEvent::RequestReceived);
        let sets = self
            .subscribe(&channels.set)
            .await?
            .filter_map(|msg| ready(set_event(&msg.payload)));

        let streams = [updates.boxed(), requests.boxed(), sets.boxed()];
        Ok(stream::select_all(streams).boxed())
    }

    /// A publisher sharing this connection.
    pub fn publisher(&self) -> NatsPublisher {
        NatsPublisher {
            client: self.client.clone(),
        }
    }

    /// Flush all pending messages to the NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Nats`] if the flush operation fails.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.client.flush().await.map_err(|e| AppError::Nats {
            message: format!("flush failed: {e}"),
        })
    }

    async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, AppError> {
        debug!(subject = subject, "subscribing");
        let subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| AppError::Nats {
                message: format!("failed to subscribe to {subject}: {e}"),
            })?;
        info!(subject = subject, "subscribed");
        Ok(subscriber)
    }
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus")
            .field("connected", &true)
            .finish()
    }
}

/// Sends snapshots on the update subject over a shared NATS connection.
///
/// Publishing only hands the message to the client's outbound queue; it
/// never waits for subscribers.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl UpdatePublisher for NatsPublisher {
    async fn publish_update(
        &mut self,
        channel: &str,
        update: &ParamUpdate,
    ) -> Result<(), BusError> {
        let payload = encode(update)?;
        self.client
            .publish(channel.to_owned(), payload.into())
            .await
            .map_err(|e| BusError::Transport {
                message: format!("failed to publish to {channel}: {e}"),
            })
    }
}

impl std::fmt::Debug for NatsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsPublisher").finish_non_exhaustive()
    }
}

/// Decode an update-subject payload.
fn update_event(payload: &[u8]) -> Option<ServerEvent> {
    match decode::<ParamUpdate>(payload) {
        Ok(update) => Some(ServerEvent::UpdateReceived(update)),
        Err(e) => {
            warn!(error = %e, "dropping malformed param update");
            None
        }
    }
}

/// Decode a set-subject payload.
fn set_event(payload: &[u8]) -> Option<ServerEvent> {
    match decode::<ParamSet>(payload) {
        Ok(set) => Some(ServerEvent::SetReceived(set)),
        Err(e) => {
            warn!(error = %e, "dropping malformed param set");
            None
        }
    }
}
