//! The parameter server state machine.
//!
//! [`ParameterServer`] owns the live parameter tree, the server identity and
//! the sequence number. Every input arrives as a [`ServerEvent`] and is
//! handled to completion before the next one is looked at, so the tree and
//! counter have exactly one writer.
//!
//! # Event rules
//!
//! | Event | Mutates | Publishes |
//! |---|---|---|
//! | `TimerTick` | nothing | once |
//! | `RequestReceived` | nothing | once |
//! | `UpdateReceived` | nothing | never (warns on a foreign identity) |
//! | `SetReceived` | one entry per accepted key, sequence +1 each | once per accepted key |

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use param_store::ParamStore;
use param_types::{ChannelNames, ParamSet, ParamUpdate, SequenceNumber, ServerId};
use tracing::{error, info, warn};

use crate::error::ServerError;
use crate::publish::UpdatePublisher;

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The periodic publish timer fired.
    TimerTick,
    /// A message arrived on the request channel. Its content is irrelevant.
    RequestReceived,
    /// A snapshot arrived on the update channel (ours or another server's).
    UpdateReceived(ParamUpdate),
    /// A set request arrived on the set channel.
    SetReceived(ParamSet),
}

/// Payload-free tag of a [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`ServerEvent::TimerTick`].
    TimerTick,
    /// See [`ServerEvent::RequestReceived`].
    Request,
    /// See [`ServerEvent::UpdateReceived`].
    Update,
    /// See [`ServerEvent::SetReceived`].
    Set,
}

impl EventKind {
    /// Short name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimerTick => "timer_tick",
            Self::Request => "request",
            Self::Update => "update",
            Self::Set => "set",
        }
    }
}

impl ServerEvent {
    /// The tag of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TimerTick => EventKind::TimerTick,
            Self::RequestReceived => EventKind::Request,
            Self::UpdateReceived(_) => EventKind::Update,
            Self::SetReceived(_) => EventKind::Set,
        }
    }
}

/// What handling a single event did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventReport {
    /// Snapshots successfully handed to the publisher.
    pub published: u32,
    /// Snapshots the publisher failed to send.
    pub publish_failures: u32,
    /// Keys whose set was applied, in order.
    pub applied: Vec<String>,
    /// Keys whose set changed nothing, in order.
    pub rejected: Vec<String>,
    /// Identity of another server seen on the update channel.
    pub foreign_server: Option<ServerId>,
}

/// The authoritative owner of one parameter tree.
#[derive(Debug)]
pub struct ParameterServer {
    store: ParamStore,
    id: ServerId,
    sequence: SequenceNumber,
    channels: ChannelNames,
    last_capture: Option<DateTime<Utc>>,
}

impl ParameterServer {
    /// Create a server for an already loaded tree.
    ///
    /// The identity is taken from the clock and the sequence starts at zero.
    pub fn new(store: ParamStore, channels: ChannelNames) -> Self {
        Self::with_identity(store, channels, ServerId::from_clock())
    }

    /// Create a server with an explicit identity.
    pub const fn with_identity(store: ParamStore, channels: ChannelNames, id: ServerId) -> Self {
        Self {
            store,
            id,
            sequence: SequenceNumber::ZERO,
            channels,
            last_capture: None,
        }
    }

    /// Load the parameter file and create a server for it.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Load`] if the file is missing or is not a
    /// valid parameter document.
    pub fn load(path: &Path, channels: ChannelNames) -> Result<Self, ServerError> {
        let store = ParamStore::from_file(path).map_err(|source| ServerError::Load {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "loaded params");
        Ok(Self::new(store, channels))
    }

    /// This server's identity.
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// The current sequence number.
    pub const fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// The channels this server uses.
    pub const fn channels(&self) -> &ChannelNames {
        &self.channels
    }

    /// The live parameter tree.
    pub const fn store(&self) -> &ParamStore {
        &self.store
    }

    /// Dispatch one event to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if a snapshot had to be built and
    /// the tree could not be serialized.
    pub async fn handle<P: UpdatePublisher>(
        &mut self,
        event: ServerEvent,
        publisher: &mut P,
    ) -> Result<EventReport, ServerError> {
        match event {
            ServerEvent::TimerTick => self.on_timer_tick(publisher).await,
            ServerEvent::RequestReceived => self.on_request_received(publisher).await,
            ServerEvent::UpdateReceived(update) => Ok(self.on_update_received(&update)),
            ServerEvent::SetReceived(set) => self.on_set_received(&set, publisher).await,
        }
    }

    /// Periodic republish. Never changes state.
    pub async fn on_timer_tick<P: UpdatePublisher>(
        &mut self,
        publisher: &mut P,
    ) -> Result<EventReport, ServerError> {
        let mut report = EventReport::default();
        self.publish_into(publisher, &mut report).await?;
        Ok(report)
    }

    /// Republish on demand. Never changes state.
    pub async fn on_request_received<P: UpdatePublisher>(
        &mut self,
        publisher: &mut P,
    ) -> Result<EventReport, ServerError> {
        let mut report = EventReport::default();
        self.publish_into(publisher, &mut report).await?;
        Ok(report)
    }

    /// Inspect a snapshot seen on the update channel.
    ///
    /// Our own snapshots are ignored. A snapshot from any other identity
    /// means a second server shares the channel; that is logged every time
    /// and nothing else happens.
    pub fn on_update_received(&self, update: &ParamUpdate) -> EventReport {
        if update.server_id == self.id {
            return EventReport::default();
        }
        warn!(
            own_server_id = %self.id,
            foreign_server_id = %update.server_id,
            foreign_sequence = %update.sequence_number,
            channel = self.channels.update,
            "multiple param servers detected"
        );
        EventReport {
            foreign_server: Some(update.server_id),
            ..EventReport::default()
        }
    }

    /// Apply a set request entry by entry.
    ///
    /// Each entry that changes the tree bumps the sequence number and is
    /// published immediately, before the next entry is applied. Entries that
    /// change nothing are logged and skipped.
    pub async fn on_set_received<P: UpdatePublisher>(
        &mut self,
        set: &ParamSet,
        publisher: &mut P,
    ) -> Result<EventReport, ServerError> {
        let mut report = EventReport::default();
        info!(entries = set.entries.len(), "got param set message");

        for entry in &set.entries {
            info!(key = entry.key, value = entry.value, "param set entry");
            if self.store.set_str(&entry.key, &entry.value) > 0 {
                self.sequence = self.sequence.next();
                report.applied.push(entry.key.clone());
                self.publish_into(publisher, &mut report).await?;
            } else {
                error!(key = entry.key, value = entry.value, "could not set param");
                report.rejected.push(entry.key.clone());
            }
        }

        Ok(report)
    }

    /// Build a snapshot of the tree as it is right now.
    ///
    /// Capture times from one server are strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the tree cannot be serialized.
    pub fn snapshot(&mut self) -> Result<ParamUpdate, ServerError> {
        let params = self
            .store
            .serialize()
            .map_err(|source| ServerError::Snapshot { source })?;
        Ok(ParamUpdate {
            params,
            captured_at: self.next_capture_time(),
            server_id: self.id,
            sequence_number: self.sequence,
        })
    }

    /// Build a snapshot and send it on the update channel.
    ///
    /// Returns whether the publisher accepted it; a refusal is logged and is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Snapshot`] if the tree cannot be serialized.
    pub async fn publish<P: UpdatePublisher>(
        &mut self,
        publisher: &mut P,
    ) -> Result<bool, ServerError> {
        let update = self.snapshot()?;
        match publisher
            .publish_update(&self.channels.update, &update)
            .await
        {
            Ok(()) => {
                info!(
                    channel = self.channels.update,
                    sequence = %update.sequence_number,
                    "published params"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    channel = self.channels.update,
                    sequence = %update.sequence_number,
                    error = %e,
                    "failed to publish params"
                );
                Ok(false)
            }
        }
    }

    async fn publish_into<P: UpdatePublisher>(
        &mut self,
        publisher: &mut P,
        report: &mut EventReport,
    ) -> Result<(), ServerError> {
        if self.publish(publisher).await? {
            report.published = report.published.saturating_add(1);
        } else {
            report.publish_failures = report.publish_failures.saturating_add(1);
        }
        Ok(())
    }

    fn next_capture_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_capture {
            Some(last) if now <= last => last
                .checked_add_signed(TimeDelta::microseconds(1))
                .unwrap_or(now),
            _ => now,
        };
        self.last_capture = Some(stamp);
        stamp
    }
}
