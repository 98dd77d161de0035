//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rollcall::catalog::RoleCatalog;
use rollcall::host::{CommunityMember, CommunitySnapshot, HostPlatform, InMemoryHost, Role};
use rollcall::normalize::MatchPolicy;
use rollcall::roster::{RosterMember, RosterSource};
use rollcall::stats::PlayerStats;
use rollcall::{
    AppState, ChannelId, CommandContext, CommunityId, MemberId, Reconciler, RoleId,
    RosterService, ServiceConfig,
};

pub const COMMUNITY: CommunityId = CommunityId(1);
pub const GENERAL: ChannelId = ChannelId(100);
pub const SUMMARY: ChannelId = ChannelId(200);
pub const MODERATOR: MemberId = MemberId(9000);

pub const ADMIN_ROLE: RoleId = RoleId(1);
pub const RECRUIT_ROLE: RoleId = RoleId(2);
pub const OWNER_ROLE: RoleId = RoleId(3);
/// Not a rank role; must never be touched
pub const EVENTS_ROLE: RoleId = RoleId(4);

/// Roster source returning whatever rows it currently holds
pub struct StaticRoster {
    rows: Mutex<Option<Vec<RosterMember>>>,
    fetches: AtomicUsize,
}

impl StaticRoster {
    pub fn new(rows: &[(&str, &str)]) -> Self {
        Self {
            rows: Mutex::new(Some(rows.iter().map(|(n, r)| row(n, r)).collect())),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose fetches always fail
    pub fn unavailable() -> Self {
        Self {
            rows: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, rows: &[(&str, &str)]) {
        *self.rows.lock().unwrap() = Some(rows.iter().map(|(n, r)| row(n, r)).collect());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn fetch_roster(&self, _clan_name: &str) -> Option<Vec<RosterMember>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().clone()
    }
}

/// Statistics source with fixed answers, plus per-player totals
pub struct FixedStats {
    pub rank: Option<i64>,
    pub total: Option<i64>,
    totals: Mutex<HashMap<String, Option<i64>>>,
}

impl FixedStats {
    pub fn new(rank: Option<i64>, total: Option<i64>) -> Self {
        Self {
            rank,
            total,
            totals: Mutex::new(HashMap::new()),
        }
    }

    /// Answer `total` for `player` from now on
    pub fn set_total(&self, player: &str, total: Option<i64>) {
        self.totals.lock().unwrap().insert(player.to_string(), total);
    }
}

#[async_trait]
impl PlayerStats for FixedStats {
    async fn total_score(&self, player: &str) -> Option<i64> {
        self.totals
            .lock()
            .unwrap()
            .get(player)
            .copied()
            .unwrap_or(self.total)
    }

    async fn overall_rank(&self, _player: &str) -> Option<i64> {
        self.rank
    }
}

pub fn row(name: &str, rank: &str) -> RosterMember {
    RosterMember {
        display_name: name.to_string(),
        rank: rank.to_string(),
        activity_score: 1000,
        secondary_score: 3,
        join_date: None,
    }
}

pub fn member(id: u64, label: &str, roles: &[RoleId]) -> CommunityMember {
    CommunityMember {
        id: MemberId(id),
        is_automated: false,
        display_label: label.to_string(),
        role_ids: roles.to_vec(),
    }
}

pub fn rank_roles() -> Vec<Role> {
    vec![
        Role { id: ADMIN_ROLE, name: "Admin".to_string() },
        Role { id: RECRUIT_ROLE, name: "Recruit".to_string() },
        Role { id: OWNER_ROLE, name: "Owner".to_string() },
        Role { id: EVENTS_ROLE, name: "Events".to_string() },
    ]
}

pub fn snapshot(members: Vec<CommunityMember>) -> CommunitySnapshot {
    CommunitySnapshot {
        community_id: COMMUNITY,
        members,
        roles: rank_roles(),
        channels: vec![GENERAL, SUMMARY],
    }
}

pub fn ctx(requester: MemberId) -> CommandContext {
    CommandContext {
        community: COMMUNITY,
        requester,
        channel: GENERAL,
    }
}

/// A wired service over an in-memory host
pub struct Fixture {
    pub service: RosterService,
    pub host: Arc<InMemoryHost>,
    pub roster: Arc<StaticRoster>,
    pub stats: Arc<FixedStats>,
    pub state: Arc<AppState>,
}

impl Fixture {
    pub async fn new(members: Vec<CommunityMember>, roster: StaticRoster) -> Self {
        Self::with_state(members, roster, Arc::new(AppState::in_memory())).await
    }

    pub async fn with_state(
        members: Vec<CommunityMember>,
        roster: StaticRoster,
        state: Arc<AppState>,
    ) -> Self {
        let host = Arc::new(InMemoryHost::with_snapshot(snapshot(members)).await);
        let roster = Arc::new(roster);
        let host_dyn: Arc<dyn HostPlatform> = host.clone();

        let reconciler = Reconciler::new(
            Arc::clone(&host_dyn),
            roster.clone(),
            RoleCatalog::default(),
            MatchPolicy::Simple,
        );
        let stats = Arc::new(FixedStats::new(Some(1234), Some(5_600_000_000)));
        let service = RosterService::new(
            Arc::clone(&state),
            reconciler,
            host_dyn,
            stats.clone(),
            ServiceConfig::default(),
        );

        Self {
            service,
            host,
            roster,
            stats,
            state,
        }
    }

    /// Fixture already linked to a clan
    pub async fn connected(members: Vec<CommunityMember>, roster: StaticRoster) -> Self {
        let fixture = Self::new(members, roster).await;
        fixture
            .service
            .connect_roster(&ctx(MODERATOR), "Lords of Gielinor")
            .await
            .unwrap();
        fixture
    }

    pub async fn roles_of(&self, member: u64) -> Vec<RoleId> {
        let mut roles = self.host.member_roles(COMMUNITY, MemberId(member)).await;
        roles.sort();
        roles
    }
}
