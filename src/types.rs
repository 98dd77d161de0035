//! Shared identifiers and error types for Rollcall
//!
//! Host identifiers are opaque 64-bit snowflakes. They are wrapped in
//! newtypes so a member id can never be handed to a role API by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake_id!(
    /// A chat community (guild) on the host platform
    CommunityId
);
snowflake_id!(
    /// A member of a community
    MemberId
);
snowflake_id!(
    /// A group role inside a community
    RoleId
);
snowflake_id!(
    /// A text channel messages can be posted to
    ChannelId
);

/// Errors surfaced by Rollcall commands
///
/// Expected failures of the external data sources never show up here as
/// transport errors: adapters report them as absent data, which the service
/// turns into [`RollcallError::RosterUnavailable`].
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// No clan has been linked to the community yet
    #[error("No clan connected. Use connect <clan name> first.")]
    NotConfigured,

    /// The roster source returned nothing usable
    #[error("Could not fetch clan members for {0}.")]
    RosterUnavailable(String),

    /// Unknown token, or a token that belongs to someone else
    #[error("No pending changes found for you.")]
    NothingPending,

    /// Schedule interval outside of the accepted range
    #[error("Please choose an interval between {min} and {max} hours.")]
    InvalidInterval { hours: i64, min: u32, max: u32 },

    /// Look-back window for score gains outside of the accepted range
    #[error("Days must be between {min} and {max}.")]
    InvalidDays { days: i64, min: u32, max: u32 },

    /// A host platform call failed outside of a best-effort batch
    #[error("Host platform error: {0}")]
    Host(#[from] HostError),

    /// Durable state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result alias for Rollcall commands
pub type Result<T> = std::result::Result<T, RollcallError>;

/// Failure of a single host platform call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Community not found: {0}")]
    CommunityNotFound(CommunityId),

    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure of the durable JSON store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
