//! Client-side copy of the most recent parameter snapshot.
//!
//! Servers republish the same snapshot every few seconds and after every
//! accepted set entry. [`ParamCache::apply`] decides whether an incoming
//! snapshot replaces the cached one:
//!
//! - the first snapshot is always taken;
//! - from the same server, only a higher sequence number replaces it;
//! - from a different server, the new server is followed and its sequence
//!   numbers are tracked from there.

use chrono::{DateTime, Utc};
use param_store::ParamStore;
use param_types::{ParamUpdate, SequenceNumber, ServerId};
use tracing::{debug, warn};

use crate::error::ClientError;

/// How an incoming snapshot was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// First snapshot seen; adopted.
    Initial,
    /// Newer snapshot from the same server; adopted.
    Newer,
    /// Same or older sequence from the same server; ignored.
    Stale,
    /// Snapshot from a different server; adopted.
    ServerChanged {
        /// The server previously followed.
        previous: ServerId,
    },
}

impl CacheOutcome {
    /// Whether the cached parameters changed.
    pub const fn adopted(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

#[derive(Debug, Clone)]
struct Cached {
    server_id: ServerId,
    sequence: SequenceNumber,
    captured_at: DateTime<Utc>,
    params: ParamStore,
}

/// The latest accepted snapshot, parsed.
#[derive(Debug, Clone, Default)]
pub struct ParamCache {
    current: Option<Cached>,
}

impl ParamCache {
    /// An empty cache.
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Offer a snapshot to the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if an otherwise acceptable snapshot
    /// carries unparsable parameters; the cache is left unchanged.
    pub fn apply(&mut self, update: &ParamUpdate) -> Result<CacheOutcome, ClientError> {
        let outcome = match &self.current {
            None => CacheOutcome::Initial,
            Some(cached) if cached.server_id != update.server_id => {
                let previous = cached.server_id;
                CacheOutcome::ServerChanged { previous }
            }
            Some(cached) if update.sequence_number > cached.sequence => CacheOutcome::Newer,
            Some(_) => CacheOutcome::Stale,
        };

        if !outcome.adopted() {
            debug!(
                server_id = %update.server_id,
                sequence = %update.sequence_number,
                "ignoring stale param update"
            );
            return Ok(outcome);
        }

        let params = ParamStore::parse(&update.params)?;
        if let CacheOutcome::ServerChanged { previous } = outcome {
            warn!(
                previous = %previous,
                current = %update.server_id,
                "param server changed, following the new server"
            );
        }
        self.current = Some(Cached {
            server_id: update.server_id,
            sequence: update.sequence_number,
            captured_at: update.captured_at,
            params,
        });
        Ok(outcome)
    }

    /// The cached parameters, if any snapshot has been adopted.
    pub fn params(&self) -> Option<&ParamStore> {
        self.current.as_ref().map(|c| &c.params)
    }

    /// The server the cache is following.
    pub fn server_id(&self) -> Option<ServerId> {
        self.current.as_ref().map(|c| c.server_id)
    }

    /// Sequence number of the cached snapshot.
    pub fn sequence(&self) -> Option<SequenceNumber> {
        self.current.as_ref().map(|c| c.sequence)
    }

    /// Capture time of the cached snapshot.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|c| c.captured_at)
    }
}
