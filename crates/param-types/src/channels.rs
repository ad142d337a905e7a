//! Channel (subject) naming.
//!
//! Every parameter server uses three channels. Each name is an optional
//! server-name prefix concatenated directly with a fixed suffix, so several
//! independent servers can share one bus.

/// Suffix of the channel carrying full parameter snapshots.
pub const PARAM_UPDATE: &str = "PARAM_UPDATE";

/// Suffix of the channel carrying snapshot requests.
pub const PARAM_REQUEST: &str = "PARAM_REQUEST";

/// Suffix of the channel carrying set requests.
pub const PARAM_SET: &str = "PARAM_SET";

/// Resolved names of the three channels for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    /// Outbound snapshots.
    pub update: String,
    /// Inbound snapshot requests.
    pub request: String,
    /// Inbound set requests.
    pub set: String,
}

impl ChannelNames {
    /// Build channel names for the given server-name prefix.
    ///
    /// The prefix is prepended without a separator; an empty prefix yields
    /// the bare suffix constants.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            update: format!("{prefix}{PARAM_UPDATE}"),
            request: format!("{prefix}{PARAM_REQUEST}"),
            set: format!("{prefix}{PARAM_SET}"),
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::with_prefix("")
    }
}
