//! Activity tracking integration tests
//!
//! Snapshots of linked players' total scores, the top-gainers board, and
//! the inactive-member summary, driven through `RosterService`.

mod common;

use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use common::*;
use rollcall::activity::{ActivitySnapshot, ACTIVITY_DOC};
use rollcall::normalize::normalize;
use rollcall::storage::JsonStore;
use rollcall::{AppState, MemberId, RollcallError};

// =============================================================================
// Test Helpers
// =============================================================================

/// Record a snapshot taken `days_ago` days in the past
async fn seed(fx: &Fixture, days_ago: i64, totals: &[(&str, i64)]) {
    fx.state
        .activity()
        .record(ActivitySnapshot {
            community_id: COMMUNITY,
            taken_at: Utc::now() - Duration::days(days_ago),
            totals: totals.iter().map(|(n, t)| (normalize(n), *t)).collect(),
        })
        .await
        .unwrap();
}

async fn link(fx: &Fixture, member: u64, name: &str) {
    fx.service
        .set_name_override(&ctx(MODERATOR), MemberId(member), name)
        .await
        .unwrap();
}

async fn linked_trio() -> Fixture {
    let fx = Fixture::new(
        vec![
            member(10, "Zezima", &[]),
            member(11, "Iron Bob", &[]),
            member(12, "Alt", &[]),
        ],
        StaticRoster::new(&[]),
    )
    .await;
    link(&fx, 10, "Zezima").await;
    link(&fx, 11, "Iron Bob").await;
    link(&fx, 12, "Alt").await;
    fx
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_snapshot_records_linked_players() {
    let fx = Fixture::new(vec![], StaticRoster::new(&[])).await;
    link(&fx, 10, "Zezima").await;
    link(&fx, 11, " zezima ").await;
    link(&fx, 12, "Ghost").await;
    fx.stats.set_total("Ghost", None);

    // Duplicate names collapse; unknown players are left out
    let recorded = fx.service.snapshot_now(&ctx(MODERATOR)).await.unwrap();
    assert_eq!(recorded, 1);

    let history = fx.state.activity().snapshots(COMMUNITY);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_of("ZEZIMA"), Some(5_600_000_000));
    assert_eq!(history[0].total_of("Ghost"), None);
}

#[tokio::test]
async fn test_snapshot_without_links_is_empty() {
    let fx = Fixture::new(vec![], StaticRoster::new(&[])).await;

    assert_eq!(fx.service.snapshot_now(&ctx(MODERATOR)).await.unwrap(), 0);
    assert_eq!(fx.state.activity().snapshots(COMMUNITY).len(), 1);
}

#[tokio::test]
async fn test_activity_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store = JsonStore::open(dir.path()).await.unwrap();
        let state = Arc::new(AppState::load(store).await.unwrap());
        let fx = Fixture::with_state(vec![], StaticRoster::new(&[]), state).await;
        link(&fx, 10, "Zezima").await;
        fx.service.snapshot_now(&ctx(MODERATOR)).await.unwrap();
    }

    assert!(dir.path().join(ACTIVITY_DOC).exists());

    let store = JsonStore::open(dir.path()).await.unwrap();
    let restored = AppState::load(store).await.unwrap();
    let history = restored.activity().snapshots(COMMUNITY);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_of("Zezima"), Some(5_600_000_000));
}

// =============================================================================
// Top gainers
// =============================================================================

#[tokio::test]
async fn test_top_gainers_window_bounds() {
    let fx = linked_trio().await;

    for bad in [0, 91, -7] {
        let err = fx.service.top_gainers(&ctx(MODERATOR), bad).await.unwrap_err();
        assert!(matches!(err, RollcallError::InvalidDays { .. }));
        assert_eq!(err.to_string(), "Days must be between 1 and 90.");
    }
    // Rejected before any snapshot is taken
    assert!(fx.state.activity().snapshots(COMMUNITY).is_empty());

    for good in [1, 90] {
        assert!(fx.service.top_gainers(&ctx(MODERATOR), good).await.is_ok());
    }
}

#[tokio::test]
async fn test_top_gainers_ranked_by_gain() {
    let fx = linked_trio().await;
    // Linked, but no longer in the community
    link(&fx, 13, "Gone").await;

    seed(
        &fx,
        3,
        &[("Zezima", 1_000), ("Iron Bob", 5_000), ("Alt", 700), ("Gone", 0)],
    )
    .await;
    fx.stats.set_total("Zezima", Some(2_500));
    fx.stats.set_total("Iron Bob", Some(5_100));
    fx.stats.set_total("Alt", Some(700));
    fx.stats.set_total("Gone", Some(99_999));

    let gains = fx.service.top_gainers(&ctx(MODERATOR), 7).await.unwrap();
    let board: Vec<(u64, &str, i64)> = gains
        .iter()
        .map(|g| (g.member_id.0, g.player.as_str(), g.gain))
        .collect();
    assert_eq!(
        board,
        vec![(10, "Zezima", 1_500), (11, "Iron Bob", 100), (12, "Alt", 0)]
    );
}

#[tokio::test]
async fn test_top_gainers_respects_window() {
    let fx = linked_trio().await;
    seed(&fx, 20, &[("Zezima", 0)]).await;
    seed(&fx, 5, &[("Zezima", 1_000)]).await;
    fx.stats.set_total("Zezima", Some(1_500));

    let week = fx.service.top_gainers(&ctx(MODERATOR), 7).await.unwrap();
    assert_eq!(week[0].member_id, MemberId(10));
    assert_eq!(week[0].gain, 500);

    let month = fx.service.top_gainers(&ctx(MODERATOR), 30).await.unwrap();
    assert_eq!(month[0].gain, 1_500);
}

#[tokio::test]
async fn test_top_gainers_limited_to_ten() {
    let members = (1..=12).map(|i| member(i, &format!("Player {i}"), &[])).collect();
    let fx = Fixture::new(members, StaticRoster::new(&[])).await;

    let mut baseline = Vec::new();
    for i in 1..=12u64 {
        let name = format!("Player {i}");
        link(&fx, i, &name).await;
        fx.stats.set_total(&name, Some(i as i64 * 100));
        baseline.push((name, 0));
    }
    let baseline: Vec<(&str, i64)> = baseline.iter().map(|(n, t)| (n.as_str(), *t)).collect();
    seed(&fx, 2, &baseline).await;

    let gains = fx.service.top_gainers(&ctx(MODERATOR), 7).await.unwrap();
    assert_eq!(gains.len(), 10);
    assert_eq!(gains[0].member_id, MemberId(12));
    assert_eq!(gains[0].gain, 1_200);
    assert_eq!(gains[9].member_id, MemberId(3));
}

// =============================================================================
// Inactive members
// =============================================================================

#[tokio::test]
async fn test_set_inactive_config_clamps_and_persists() {
    let fx = linked_trio().await;

    let set = fx
        .service
        .set_inactive_config(&ctx(MODERATOR), 14, SUMMARY)
        .await
        .unwrap();
    assert_eq!(set.days, 14);
    assert_eq!(set.text, "Inactive summary set: 14 days, channel <#200>.");

    let config = fx.state.config(COMMUNITY);
    assert_eq!(config.inactive_days(), 14);
    assert_eq!(config.inactive_summary_channel_id, Some(SUMMARY));

    let set = fx
        .service
        .set_inactive_config(&ctx(MODERATOR), 500, GENERAL)
        .await
        .unwrap();
    assert_eq!(set.days, 180);
    let set = fx
        .service
        .set_inactive_config(&ctx(MODERATOR), 0, GENERAL)
        .await
        .unwrap();
    assert_eq!(set.days, 1);
}

#[tokio::test]
async fn test_inactive_members_have_no_gain() {
    let fx = linked_trio().await;
    fx.service
        .set_inactive_config(&ctx(MODERATOR), 14, SUMMARY)
        .await
        .unwrap();

    seed(&fx, 10, &[("Zezima", 1_000), ("Iron Bob", 5_000)]).await;
    seed(&fx, 0, &[("Zezima", 1_000), ("Iron Bob", 6_000)]).await;

    let inactive = fx.service.inactive_members(&ctx(MODERATOR)).await.unwrap();
    let ids: Vec<MemberId> = inactive.iter().map(|m| m.member_id).collect();
    // Alt has no history at all, which reads as no gain
    assert_eq!(ids, vec![MemberId(10), MemberId(12)]);
}

#[tokio::test]
async fn test_gain_outside_threshold_does_not_count() {
    let fx = linked_trio().await;
    fx.service
        .set_inactive_config(&ctx(MODERATOR), 7, SUMMARY)
        .await
        .unwrap();

    // Iron Bob's gain happened before the 7-day window
    seed(&fx, 20, &[("Iron Bob", 1_000)]).await;
    seed(&fx, 10, &[("Iron Bob", 9_000)]).await;
    seed(&fx, 3, &[("Iron Bob", 9_000)]).await;
    seed(&fx, 0, &[("Iron Bob", 9_000)]).await;

    let inactive = fx.service.inactive_members(&ctx(MODERATOR)).await.unwrap();
    assert!(inactive.iter().any(|m| m.member_id == MemberId(11)));
}

#[tokio::test]
async fn test_inactive_summary_posted_to_configured_channel() {
    let fx = linked_trio().await;
    fx.service
        .set_inactive_config(&ctx(MODERATOR), 14, SUMMARY)
        .await
        .unwrap();

    seed(&fx, 10, &[("Zezima", 1_000), ("Iron Bob", 5_000), ("Alt", 10)]).await;
    fx.stats.set_total("Zezima", Some(1_000));
    fx.stats.set_total("Iron Bob", Some(6_000));
    fx.stats.set_total("Alt", Some(20));

    let posted = fx.service.post_inactive_summary(&ctx(MODERATOR)).await.unwrap();
    assert_eq!(posted, 1);

    let sent = fx.host.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, SUMMARY);
    assert_eq!(
        sent[0].content,
        "Inactive members (14+ days without gain)\n- <@10> (Zezima)"
    );
}

#[tokio::test]
async fn test_inactive_summary_needs_channel() {
    let fx = linked_trio().await;

    let posted = fx.service.post_inactive_summary(&ctx(MODERATOR)).await.unwrap();
    assert_eq!(posted, 0);
    assert!(fx.host.sent_messages().await.is_empty());
    assert!(fx.state.activity().snapshots(COMMUNITY).is_empty());
}

#[tokio::test]
async fn test_inactive_summary_silent_when_everyone_active() {
    let fx = linked_trio().await;
    fx.service
        .set_inactive_config(&ctx(MODERATOR), 14, SUMMARY)
        .await
        .unwrap();

    seed(&fx, 5, &[("Zezima", 1), ("Iron Bob", 1), ("Alt", 1)]).await;

    // Every fresh total is the fixed 5.6 billion
    let posted = fx.service.post_inactive_summary(&ctx(MODERATOR)).await.unwrap();
    assert_eq!(posted, 0);
    assert!(fx.host.sent_messages().await.is_empty());
}
