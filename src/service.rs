//! Command entry points
//!
//! [`RosterService`] is what a chat front end calls. It is host-agnostic:
//! every command takes a [`CommandContext`] naming the community, the invoking
//! member and the invoking channel, and returns a typed outcome plus, where
//! the front end needs one, rendered text.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::activity::{
    clamp_inactive_days, collect_totals, gain_window, ActivitySnapshot, TOP_GAINERS_LIMIT,
};
use crate::engine::{ApplyReport, AuditReport, Reconciler, RosterIndex, SyncOutcome};
use crate::host::HostPlatform;
use crate::roster::RosterMember;
use crate::scheduler::{JobInfo, ScheduledSync, SyncInterval, SyncScheduler};
use crate::state::{AppState, CommunityConfig};
use crate::stats::PlayerStats;
use crate::types::{ChannelId, CommunityId, MemberId, RollcallError, Result};

/// Members listed in one inactive-member summary
pub const INACTIVE_SUMMARY_LIMIT: usize = 25;

/// Default prompt posted after unmatched-member mentions
pub const DEFAULT_PING_PROMPT: &str = "If you are mentioned below, please update your display name to your exact in-game name (or ask a moderator to set an override for you) so role syncs work.";

/// Tunables for command output
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deltas listed in an audit summary before "…and N more."
    pub audit_preview_limit: usize,
    /// Mentions per message when pinging unmatched members
    pub mention_batch_size: usize,
    pub ping_prompt: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            audit_preview_limit: 20,
            mention_batch_size: 20,
            ping_prompt: DEFAULT_PING_PROMPT.to_string(),
        }
    }
}

/// Who invoked a command, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub community: CommunityId,
    pub requester: MemberId,
    pub channel: ChannelId,
}

/// Result of an audit awaiting confirmation
#[derive(Debug, Clone)]
pub struct AuditSummary {
    /// Token for `apply_pending` / `cancel_pending`
    pub token: String,
    pub report: AuditReport,
    /// Human-readable summary
    pub text: String,
}

/// Result of `ping_unmatched`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOutcome {
    /// Members mentioned; zero when everyone matched
    pub pinged: usize,
    pub channel: ChannelId,
}

/// Statistics and roster data for one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLookup {
    pub player: String,
    pub overall_rank: Option<i64>,
    pub total_score: Option<i64>,
    /// The player's roster row, when a clan is linked and lists them
    pub roster_entry: Option<RosterMember>,
}

/// Score gained by one linked member over a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreGain {
    pub member_id: MemberId,
    /// Roster name the member is linked to
    pub player: String,
    pub gain: i64,
}

/// Result of `set_inactive_config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveConfig {
    /// Threshold after clamping
    pub days: u32,
    pub channel: ChannelId,
    pub text: String,
}

/// `1234567` as `1,234,567`
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Render the top-gainers board
pub fn top_gainers_text(
    days: u32,
    gains: &[ScoreGain],
    mention: impl Fn(MemberId) -> String,
) -> String {
    let mut lines = vec![format!("Top score gainers (last {days} days)")];
    if gains.is_empty() {
        lines.push("No linked members yet.".to_string());
    }
    for (i, g) in gains.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}): {}",
            i + 1,
            mention(g.member_id),
            g.player,
            group_thousands(g.gain)
        ));
    }
    lines.join("\n")
}

/// Render the inactive-member summary
pub fn inactive_summary_text(
    days: u32,
    inactive: &[ScoreGain],
    mention: impl Fn(MemberId) -> String,
) -> String {
    let mut lines = vec![format!("Inactive members ({days}+ days without gain)")];
    for m in inactive.iter().take(INACTIVE_SUMMARY_LIMIT) {
        lines.push(format!("- {} ({})", mention(m.member_id), m.player));
    }
    if inactive.len() > INACTIVE_SUMMARY_LIMIT {
        lines.push(format!("…and {} more.", inactive.len() - INACTIVE_SUMMARY_LIMIT));
    }
    lines.join("\n")
}

/// Text posted to the summary channel after a scheduled run
pub fn sync_summary_text(outcome: &SyncOutcome) -> String {
    format!(
        "Scheduled sync ran: updated {} members. Unmatched: {}.",
        outcome.changed,
        outcome.unmatched.len()
    )
}

/// Render an audit report the way it is shown to the requester
pub fn audit_summary_text(
    report: &AuditReport,
    preview_limit: usize,
    mention: impl Fn(MemberId) -> String,
) -> String {
    let mut lines = Vec::with_capacity(preview_limit + 3);
    lines.push(format!("Mismatches: {}", report.deltas.len()));
    for delta in report.deltas.iter().take(preview_limit) {
        lines.push(format!(
            "• {} → {}",
            mention(delta.member_id),
            delta.desired_role_name
        ));
    }
    if report.deltas.len() > preview_limit {
        lines.push(format!("…and {} more.", report.deltas.len() - preview_limit));
    }
    lines.push(format!("Unmatched (not in clan): {}", report.unmatched.len()));
    lines.join("\n")
}

/// Sync of one community using its stored configuration
///
/// Shared by `sync_now` and by scheduled jobs.
pub struct CommunitySync {
    state: Arc<AppState>,
    reconciler: Arc<Reconciler>,
    host: Arc<dyn HostPlatform>,
}

impl CommunitySync {
    pub fn new(
        state: Arc<AppState>,
        reconciler: Arc<Reconciler>,
        host: Arc<dyn HostPlatform>,
    ) -> Self {
        Self {
            state,
            reconciler,
            host,
        }
    }
}

#[async_trait]
impl ScheduledSync for CommunitySync {
    async fn sync(&self, community: CommunityId) -> Result<SyncOutcome> {
        let config = self.state.config(community);
        let clan = config.clan().ok_or(RollcallError::NotConfigured)?;
        let overrides = self.state.overrides_for(community);
        self.reconciler.sync(community, clan, &overrides).await
    }

    async fn report(
        &self,
        community: CommunityId,
        channel: ChannelId,
        outcome: &SyncOutcome,
    ) -> Result<()> {
        self.host
            .send_message(community, channel, &sync_summary_text(outcome))
            .await?;
        Ok(())
    }
}

/// Host-agnostic roster commands
pub struct RosterService {
    state: Arc<AppState>,
    reconciler: Arc<Reconciler>,
    host: Arc<dyn HostPlatform>,
    stats: Arc<dyn PlayerStats>,
    community_sync: Arc<CommunitySync>,
    scheduler: SyncScheduler,
    config: ServiceConfig,
}

impl RosterService {
    pub fn new(
        state: Arc<AppState>,
        reconciler: Reconciler,
        host: Arc<dyn HostPlatform>,
        stats: Arc<dyn PlayerStats>,
        config: ServiceConfig,
    ) -> Self {
        let reconciler = Arc::new(reconciler);
        let community_sync = Arc::new(CommunitySync::new(
            Arc::clone(&state),
            Arc::clone(&reconciler),
            Arc::clone(&host),
        ));
        let scheduler = SyncScheduler::new(community_sync.clone());

        Self {
            state,
            reconciler,
            host,
            stats,
            community_sync,
            scheduler,
            config,
        }
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    fn clan_of(&self, community: CommunityId) -> Result<String> {
        self.state
            .config(community)
            .clan()
            .map(str::to_string)
            .ok_or(RollcallError::NotConfigured)
    }

    /// Link the community to a clan
    pub async fn connect_roster(&self, ctx: &CommandContext, clan_name: &str) -> Result<CommunityConfig> {
        let clan = clan_name.trim().to_string();
        let config = self
            .state
            .update_config(ctx.community, |c| c.clan_name = Some(clan.clone()))
            .await?;
        info!(community = %ctx.community, clan = %clan, "Clan connected");
        Ok(config)
    }

    /// Match `member` against the roster under `name` instead of their label
    pub async fn set_name_override(
        &self,
        ctx: &CommandContext,
        member: MemberId,
        name: &str,
    ) -> Result<()> {
        self.state.set_override(ctx.community, member, name).await?;
        info!(community = %ctx.community, member = %member, by = %ctx.requester, "Name override set");
        Ok(())
    }

    /// Audit and hold the result for confirmation by the requester
    pub async fn audit(&self, ctx: &CommandContext) -> Result<AuditSummary> {
        let clan = self.clan_of(ctx.community)?;
        let overrides = self.state.overrides_for(ctx.community);
        let report = self.reconciler.audit(ctx.community, &clan, &overrides).await?;

        let text = audit_summary_text(&report, self.config.audit_preview_limit, |m| {
            self.host.mention(m)
        });
        let token = self
            .state
            .pending()
            .add(ctx.community, ctx.requester, report.deltas.clone());

        Ok(AuditSummary {
            token,
            report,
            text,
        })
    }

    /// Apply a pending change-set owned by the requester
    pub async fn apply_pending(&self, ctx: &CommandContext, token: &str) -> Result<ApplyReport> {
        let entry = self
            .state
            .pending()
            .take_for(token, ctx.community, ctx.requester)
            .ok_or(RollcallError::NothingPending)?;

        Ok(self.reconciler.apply(ctx.community, &entry.deltas).await)
    }

    /// Drop a pending change-set owned by the requester
    pub fn cancel_pending(&self, ctx: &CommandContext, token: &str) -> Result<()> {
        let entry = self
            .state
            .pending()
            .take_for(token, ctx.community, ctx.requester)
            .ok_or(RollcallError::NothingPending)?;

        debug!(token = %token, deltas = entry.deltas.len(), "Pending change-set cancelled");
        Ok(())
    }

    /// Audit and apply immediately
    pub async fn sync_now(&self, ctx: &CommandContext) -> Result<SyncOutcome> {
        self.community_sync.sync(ctx.community).await
    }

    /// Start or replace the recurring sync of the community
    ///
    /// A new summary channel replaces the stored one; without one the stored
    /// channel is kept.
    pub async fn schedule(
        &self,
        ctx: &CommandContext,
        interval_hours: i64,
        summary_channel: Option<ChannelId>,
    ) -> Result<JobInfo> {
        let interval = SyncInterval::from_hours(interval_hours)?;

        let config = self
            .state
            .update_config(ctx.community, |c| {
                if summary_channel.is_some() {
                    c.summary_channel_id = summary_channel;
                }
            })
            .await?;

        Ok(self
            .scheduler
            .start(ctx.community, interval, config.summary_channel_id))
    }

    /// Stop the recurring sync; `false` if none was running
    pub fn stop_schedule(&self, ctx: &CommandContext) -> bool {
        self.scheduler.stop(ctx.community)
    }

    /// Mention members the roster does not know, then post a prompt
    ///
    /// Posts to `target`, or the invoking channel without one. Nothing is
    /// posted when everyone matches.
    pub async fn ping_unmatched(
        &self,
        ctx: &CommandContext,
        target: Option<ChannelId>,
        message: Option<&str>,
    ) -> Result<PingOutcome> {
        let clan = self.clan_of(ctx.community)?;
        let overrides = self.state.overrides_for(ctx.community);
        let report = self.reconciler.audit(ctx.community, &clan, &overrides).await?;
        let channel = target.unwrap_or(ctx.channel);

        if report.unmatched.is_empty() {
            return Ok(PingOutcome { pinged: 0, channel });
        }

        let mentions: Vec<String> = report
            .unmatched
            .iter()
            .map(|m| self.host.mention(m.id))
            .collect();
        for batch in mentions.chunks(self.config.mention_batch_size.max(1)) {
            self.host
                .send_message(ctx.community, channel, &batch.join(" "))
                .await?;
        }

        let prompt = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.ping_prompt);
        self.host
            .send_message(ctx.community, channel, &format!("📣 {prompt}"))
            .await?;

        info!(community = %ctx.community, channel = %channel, pinged = mentions.len(), "Pinged unmatched members");
        Ok(PingOutcome {
            pinged: mentions.len(),
            channel,
        })
    }

    /// Create every catalog role the community lacks
    pub async fn create_rank_roles(&self, ctx: &CommandContext) -> Result<Vec<String>> {
        let roles = self.host.list_roles(ctx.community).await?;
        let missing: Vec<String> = self
            .reconciler
            .catalog()
            .missing_from(&roles)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut created = Vec::with_capacity(missing.len());
        for name in missing {
            let role = self.host.create_role(ctx.community, &name).await?;
            info!(community = %ctx.community, role = %role.name, id = %role.id, "Rank role created");
            created.push(role.name);
        }
        Ok(created)
    }

    /// Statistics for `player`, plus their roster row when a clan is linked
    pub async fn lookup(&self, ctx: &CommandContext, player: &str) -> MemberLookup {
        let player = player.trim();
        let (overall_rank, total_score) = tokio::join!(
            self.stats.overall_rank(player),
            self.stats.total_score(player)
        );

        let roster_entry = match self.state.config(ctx.community).clan() {
            Some(clan) => match self.reconciler.fetch_roster(clan).await {
                Ok(roster) => {
                    let index = RosterIndex::build(&roster, self.reconciler.policy());
                    index.lookup(player).cloned()
                }
                Err(e) => {
                    warn!(community = %ctx.community, error = %e, "Roster unavailable for lookup");
                    None
                }
            },
            None => None,
        };

        MemberLookup {
            player: player.to_string(),
            overall_rank,
            total_score,
            roster_entry,
        }
    }

    /// Record the current total score of every linked player
    ///
    /// Returns how many players the statistics source knew.
    pub async fn snapshot_now(&self, ctx: &CommandContext) -> Result<usize> {
        let overrides = self.state.overrides_for(ctx.community);
        let totals = collect_totals(overrides.values(), self.stats.as_ref()).await;
        let recorded = totals.len();

        self.state
            .activity()
            .record(ActivitySnapshot {
                community_id: ctx.community,
                taken_at: Utc::now(),
                totals,
            })
            .await?;
        info!(community = %ctx.community, linked = overrides.len(), recorded, "Activity snapshot taken");
        Ok(recorded)
    }

    /// Linked members still in the community, ordered by id
    async fn linked_members(&self, community: CommunityId) -> Result<Vec<(MemberId, String)>> {
        let present: HashSet<MemberId> = self
            .host
            .list_members(community)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let mut linked: Vec<(MemberId, String)> = self
            .state
            .overrides_for(community)
            .into_iter()
            .filter(|(member, _)| present.contains(member))
            .collect();
        linked.sort_by_key(|(member, _)| *member);
        Ok(linked)
    }

    /// Linked members with the largest score gain over the last `days` days
    ///
    /// Takes a fresh snapshot first, so the window ends now.
    pub async fn top_gainers(&self, ctx: &CommandContext, days: i64) -> Result<Vec<ScoreGain>> {
        let days = gain_window(days)?;
        self.snapshot_now(ctx).await?;

        let activity = self.state.activity();
        let mut gains: Vec<ScoreGain> = self
            .linked_members(ctx.community)
            .await?
            .into_iter()
            .map(|(member_id, player)| ScoreGain {
                gain: activity.gain(ctx.community, &player, days),
                member_id,
                player,
            })
            .collect();

        gains.sort_by(|a, b| b.gain.cmp(&a.gain).then(a.member_id.cmp(&b.member_id)));
        gains.truncate(TOP_GAINERS_LIMIT);
        Ok(gains)
    }

    /// Set the inactivity threshold and where its summary is posted
    pub async fn set_inactive_config(
        &self,
        ctx: &CommandContext,
        days: i64,
        channel: ChannelId,
    ) -> Result<InactiveConfig> {
        let days = clamp_inactive_days(days);
        self.state
            .update_config(ctx.community, |c| {
                c.inactive_days_threshold = Some(days);
                c.inactive_summary_channel_id = Some(channel);
            })
            .await?;

        info!(community = %ctx.community, days, channel = %channel, "Inactive summary configured");
        Ok(InactiveConfig {
            days,
            channel,
            text: format!(
                "Inactive summary set: {days} days, channel {}.",
                self.host.mention_channel(channel)
            ),
        })
    }

    /// Linked members with no score gain over the community's threshold
    pub async fn inactive_members(&self, ctx: &CommandContext) -> Result<Vec<ScoreGain>> {
        let days = self.state.config(ctx.community).inactive_days();
        let activity = self.state.activity();

        Ok(self
            .linked_members(ctx.community)
            .await?
            .into_iter()
            .filter_map(|(member_id, player)| {
                let gain = activity.gain(ctx.community, &player, days);
                (gain <= 0).then_some(ScoreGain {
                    member_id,
                    player,
                    gain,
                })
            })
            .collect())
    }

    /// Snapshot, then post the inactive members to the configured channel
    ///
    /// Returns the number of inactive members. Nothing is posted without a
    /// configured channel or when nobody is inactive.
    pub async fn post_inactive_summary(&self, ctx: &CommandContext) -> Result<usize> {
        let config = self.state.config(ctx.community);
        let Some(channel) = config.inactive_summary_channel_id else {
            debug!(community = %ctx.community, "No inactive summary channel configured");
            return Ok(0);
        };

        self.snapshot_now(ctx).await?;
        let inactive = self.inactive_members(ctx).await?;
        if inactive.is_empty() {
            return Ok(0);
        }

        let text = inactive_summary_text(config.inactive_days(), &inactive, |m| {
            self.host.mention(m)
        });
        self.host.send_message(ctx.community, channel, &text).await?;
        info!(community = %ctx.community, channel = %channel, inactive = inactive.len(), "Inactive summary posted");
        Ok(inactive.len())
    }

    /// Stop every scheduled job
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
