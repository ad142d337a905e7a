//! Strongly-typed identity and ordering values carried on every update.
//!
//! A [`ServerId`] distinguishes one running parameter server from any other
//! server publishing on the same bus. A [`SequenceNumber`] counts the
//! mutations a server has applied since it started.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Opaque 64-bit identity of a running parameter server.
///
/// Chosen once at startup from the wall clock and never changed for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub i64);

impl ServerId {
    /// Derive an identity from the current time in microseconds since the
    /// Unix epoch.
    pub fn from_clock() -> Self {
        Self(Utc::now().timestamp_micros())
    }

    /// Return the raw identity value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for ServerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ServerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Monotonic 32-bit mutation counter.
///
/// Starts at zero and only moves forward, one step per applied set entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(pub u32);

impl SequenceNumber {
    /// The sequence number of a freshly started server.
    pub const ZERO: Self = Self(0);

    /// The number that follows this one.
    ///
    /// Saturates at `u32::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Return the raw counter value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_zero_and_steps_by_one() {
        let seq = SequenceNumber::default();
        assert_eq!(seq, SequenceNumber::ZERO);
        assert_eq!(seq.next().get(), 1);
        assert_eq!(seq.next().next().get(), 2);
    }

    #[test]
    fn sequence_saturates() {
        assert_eq!(SequenceNumber(u32::MAX).next(), SequenceNumber(u32::MAX));
    }

    #[test]
    fn server_id_from_clock_is_positive() {
        assert!(ServerId::from_clock().into_inner() > 0);
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&ServerId(42)).ok();
        assert_eq!(json.as_deref(), Some("42"));
        let json = serde_json::to_string(&SequenceNumber(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));
    }
}
