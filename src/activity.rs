//! Score activity tracking
//!
//! A snapshot records the current total score of every player linked to a
//! community through a name override, keyed by normalized name. The gain of
//! a player over a look-back window is the difference between the oldest
//! and the newest snapshot inside that window that list the player. Gains
//! drive the top-gainers board and the inactive-member query.
//!
//! Snapshots live in memory, sorted by time per community, and are written
//! to a single JSON document when a store is attached.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::normalize::normalize;
use crate::stats::PlayerStats;
use crate::storage::JsonStore;
use crate::types::{CommunityId, RollcallError, Result, StorageError};

/// Document holding activity snapshots
pub const ACTIVITY_DOC: &str = "activity_snapshots.json";

/// Shortest look-back window for gains, in days
pub const MIN_GAIN_DAYS: u32 = 1;
/// Longest look-back window for gains, in days
pub const MAX_GAIN_DAYS: u32 = 90;
/// Entries on the top-gainers board
pub const TOP_GAINERS_LIMIT: usize = 10;

pub const MIN_INACTIVE_DAYS: u32 = 1;
pub const MAX_INACTIVE_DAYS: u32 = 180;
/// Inactivity threshold of a community that never set one
pub const DEFAULT_INACTIVE_DAYS: u32 = 30;

/// Snapshots older than this, relative to the newest, are dropped
const RETENTION_DAYS: i64 = MAX_INACTIVE_DAYS as i64;

/// Total scores of a community's linked players at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub community_id: CommunityId,
    pub taken_at: DateTime<Utc>,
    /// Normalized player name to total score
    pub totals: BTreeMap<String, i64>,
}

impl ActivitySnapshot {
    pub fn total_of(&self, player: &str) -> Option<i64> {
        self.totals.get(&normalize(player)).copied()
    }
}

/// Accept a gain window only within `MIN_GAIN_DAYS..=MAX_GAIN_DAYS`
pub fn gain_window(days: i64) -> Result<u32> {
    let accepted = i64::from(MIN_GAIN_DAYS)..=i64::from(MAX_GAIN_DAYS);
    if !accepted.contains(&days) {
        return Err(RollcallError::InvalidDays {
            days,
            min: MIN_GAIN_DAYS,
            max: MAX_GAIN_DAYS,
        });
    }
    Ok(days as u32)
}

/// Inactivity thresholds are clamped rather than rejected
pub fn clamp_inactive_days(days: i64) -> u32 {
    days.clamp(i64::from(MIN_INACTIVE_DAYS), i64::from(MAX_INACTIVE_DAYS)) as u32
}

/// Score gained by `player` between `since` and `until`, never negative
///
/// Zero when fewer than two snapshots in the window list the player.
pub fn gain_between(
    snapshots: &[ActivitySnapshot],
    player: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> i64 {
    let key = normalize(player);
    let mut seen = snapshots
        .iter()
        .filter(|s| s.taken_at >= since && s.taken_at <= until)
        .filter_map(|s| s.totals.get(&key).map(|total| (s.taken_at, *total)));

    let Some(first) = seen.next() else {
        return 0;
    };
    let (start, end) = seen.fold((first, first), |(start, end), point| {
        (
            if point.0 < start.0 { point } else { start },
            if point.0 >= end.0 { point } else { end },
        )
    });
    (end.1 - start.1).max(0)
}

/// Fetch the current total score of every distinct player in `players`
///
/// Players are deduplicated by normalized name. Players the statistics
/// source does not know are left out.
pub async fn collect_totals<I, S>(players: I, stats: &dyn PlayerStats) -> BTreeMap<String, i64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let distinct: Vec<String> = players
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(normalize(p)))
        .collect();

    let totals = join_all(distinct.iter().map(|p| stats.total_score(p))).await;
    distinct
        .iter()
        .zip(totals)
        .filter_map(|(player, total)| total.map(|t| (normalize(player), t)))
        .collect()
}

/// History of activity snapshots for every community
pub struct ActivityLog {
    snapshots: DashMap<CommunityId, Vec<ActivitySnapshot>>,
    store: Option<JsonStore>,
    persist_lock: Mutex<()>,
}

impl ActivityLog {
    pub fn in_memory() -> Self {
        Self {
            snapshots: DashMap::new(),
            store: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Restore the history from `store`; new snapshots are saved back to it
    pub async fn load(store: JsonStore) -> std::result::Result<Self, StorageError> {
        let saved: Vec<ActivitySnapshot> = store.load(ACTIVITY_DOC).await?;
        info!(snapshots = saved.len(), "Activity history restored");

        let log = Self {
            store: Some(store),
            ..Self::in_memory()
        };
        for snapshot in saved {
            log.insert(snapshot);
        }
        Ok(log)
    }

    fn insert(&self, snapshot: ActivitySnapshot) {
        let mut history = self.snapshots.entry(snapshot.community_id).or_default();
        let at = history.partition_point(|s| s.taken_at <= snapshot.taken_at);
        history.insert(at, snapshot);
    }

    /// Add a snapshot, drop expired ones, and persist
    pub async fn record(
        &self,
        snapshot: ActivitySnapshot,
    ) -> std::result::Result<(), StorageError> {
        let community = snapshot.community_id;
        let players = snapshot.totals.len();
        self.insert(snapshot);

        if let Some(mut history) = self.snapshots.get_mut(&community) {
            if let Some(newest) = history.last().map(|s| s.taken_at) {
                let cutoff = newest - Duration::days(RETENTION_DAYS);
                history.retain(|s| s.taken_at >= cutoff);
            }
        }

        debug!(community = %community, players, "Activity snapshot recorded");
        self.persist().await
    }

    /// Snapshots of one community, oldest first
    pub fn snapshots(&self, community: CommunityId) -> Vec<ActivitySnapshot> {
        self.snapshots
            .get(&community)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Score gained by `player` over the last `days` days
    pub fn gain(&self, community: CommunityId, player: &str, days: u32) -> i64 {
        self.gain_at(community, player, days, Utc::now())
    }

    /// Score gained by `player` over the `days` days before `now`
    pub fn gain_at(
        &self,
        community: CommunityId,
        player: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> i64 {
        let Some(history) = self.snapshots.get(&community) else {
            return 0;
        };
        let since = now - Duration::days(i64::from(days));
        gain_between(history.value(), player, since, now)
    }

    async fn persist(&self) -> std::result::Result<(), StorageError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;

        let mut all: Vec<ActivitySnapshot> = self
            .snapshots
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        all.sort_by_key(|s| (s.community_id, s.taken_at));
        store.save(ACTIVITY_DOC, &all).await
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: CommunityId = CommunityId(1);

    fn at(days_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(days_ago)
    }

    fn snap(taken_at: DateTime<Utc>, totals: &[(&str, i64)]) -> ActivitySnapshot {
        ActivitySnapshot {
            community_id: G,
            taken_at,
            totals: totals
                .iter()
                .map(|(name, total)| (normalize(name), *total))
                .collect(),
        }
    }

    #[test]
    fn test_gain_window_bounds() {
        assert!(gain_window(0).is_err());
        assert!(gain_window(91).is_err());
        assert_eq!(gain_window(1).unwrap(), 1);
        assert_eq!(gain_window(90).unwrap(), 90);
        assert_eq!(
            gain_window(-3).unwrap_err().to_string(),
            "Days must be between 1 and 90."
        );
    }

    #[test]
    fn test_inactive_days_clamped() {
        assert_eq!(clamp_inactive_days(0), 1);
        assert_eq!(clamp_inactive_days(45), 45);
        assert_eq!(clamp_inactive_days(1000), 180);
    }

    #[test]
    fn test_gain_is_newest_minus_oldest_in_window() {
        let now = Utc::now();
        let history = vec![
            snap(at(20, now), &[("Zezima", 100)]),
            snap(at(6, now), &[("Zezima", 500)]),
            snap(at(3, now), &[("Zezima", 650)]),
            snap(at(0, now), &[("Zezima", 900)]),
        ];

        assert_eq!(gain_between(&history, "zezima", at(7, now), now), 400);
        assert_eq!(gain_between(&history, "Zezima", at(30, now), now), 800);
        assert_eq!(gain_between(&history, "Zezima", at(4, now), at(1, now)), 0);
    }

    #[test]
    fn test_gain_zero_without_history() {
        let now = Utc::now();
        assert_eq!(gain_between(&[], "Zezima", at(7, now), now), 0);

        let history = vec![snap(at(1, now), &[("Other", 5)]), snap(now, &[("Other", 9)])];
        assert_eq!(gain_between(&history, "Zezima", at(7, now), now), 0);
    }

    #[test]
    fn test_gain_never_negative() {
        let now = Utc::now();
        let history = vec![snap(at(2, now), &[("Zezima", 900)]), snap(now, &[("Zezima", 10)])];
        assert_eq!(gain_between(&history, "Zezima", at(7, now), now), 0);
    }

    #[test]
    fn test_gain_starts_where_player_first_appears() {
        let now = Utc::now();
        let history = vec![
            snap(at(5, now), &[("Other", 1)]),
            snap(at(2, now), &[("Other", 1), ("Iron Bob", 1_000_000)]),
            snap(now, &[("Other", 1), ("Iron Bob", 1_000_250)]),
        ];
        assert_eq!(gain_between(&history, "Iron Bob", at(7, now), now), 250);
    }

    #[tokio::test]
    async fn test_log_keeps_time_order_and_expires() {
        let log = ActivityLog::in_memory();
        let now = Utc::now();

        log.record(snap(at(1, now), &[("Zezima", 2)])).await.unwrap();
        log.record(snap(at(200, now), &[("Zezima", 0)])).await.unwrap();
        log.record(snap(at(3, now), &[("Zezima", 1)])).await.unwrap();

        let history = log.snapshots(G);
        let days: Vec<i64> = history.iter().map(|s| (now - s.taken_at).num_days()).collect();
        // The 200-day-old snapshot is past retention
        assert_eq!(days, vec![3, 1]);
        assert_eq!(history[1].total_of("ZEZIMA"), Some(2));
        assert_eq!(log.gain_at(G, "Zezima", 7, now), 1);
        assert_eq!(log.gain_at(CommunityId(2), "Zezima", 7, now), 0);
    }
}
