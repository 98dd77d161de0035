//! Clan roster source
//!
//! The roster is the authoritative list of clan members and their in-game
//! ranks. It is fetched fresh for every audit and never persisted here.
//!
//! ## Contract
//!
//! A failed fetch (network error, non-2xx status, unreadable payload) is not an
//! error: [`RosterSource::fetch_roster`] returns `None` and the caller reports
//! "could not fetch" to the user.

pub mod client;
pub mod parse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use client::{HttpRosterSource, RosterClientConfig};
pub use parse::{decode_latin1, parse_join_date, parse_roster};

/// One row of the clan roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    /// In-game name
    pub display_name: String,
    /// In-game clan rank (e.g. "Admin")
    pub rank: String,
    /// Clan experience
    pub activity_score: i64,
    /// Clan kills
    pub secondary_score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
}

/// Anything that can produce a clan roster
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch the members of `clan_name`, or `None` if no usable data came back
    async fn fetch_roster(&self, clan_name: &str) -> Option<Vec<RosterMember>>;
}
