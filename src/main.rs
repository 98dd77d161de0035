//! rollcall: keep rank roles in step with the clan roster
//!
//! The binary drives the library against JSON community snapshots, which is
//! how the reconciliation can be run and inspected without a live chat host.

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use rollcall::{
    activity::gain_window,
    catalog::RoleCatalog,
    config::{Args, Command, SnapshotArgs},
    host::{CommunitySnapshot, HostPlatform, InMemoryHost},
    logging,
    roster::{HttpRosterSource, RosterMember, RosterSource},
    service::top_gainers_text,
    stats::{HttpStatsSource, PlayerStats},
    storage::JsonStore,
    AppState, ChannelId, CommandContext, CommunityId, MemberId, Reconciler, RosterService,
    ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Data dir: {}", args.data_dir.display());
    info!("Roster source: {}", args.roster_url);
    info!("Match policy: {}", args.match_policy);

    let roster: Arc<dyn RosterSource> = Arc::new(HttpRosterSource::new(args.roster_client_config()));
    let stats: Arc<dyn PlayerStats> = Arc::new(HttpStatsSource::new(args.stats_client_config()));

    match args.command.clone() {
        Command::Roster { clan } => {
            let members = roster
                .fetch_roster(&clan)
                .await
                .with_context(|| format!("Could not fetch clan members for {clan}"))?;
            print_roster(&members);
        }

        Command::Lookup { player, clan } => {
            // Lookups never touch the stored configuration
            let state = Arc::new(AppState::in_memory());
            let host = Arc::new(InMemoryHost::new());
            let service = build_service(&args, state, host, roster, stats);
            let ctx = cli_context(CommunityId::default());
            if let Some(clan) = clan {
                service.connect_roster(&ctx, &clan).await?;
            }

            let found = service.lookup(&ctx, &player).await;
            println!("Player:        {}", found.player);
            println!("Overall rank:  {}", or_na(found.overall_rank));
            println!("Total score:   {}", or_na(found.total_score));
            match found.roster_entry {
                Some(row) => {
                    println!("Clan rank:     {}", row.rank);
                    println!("Clan score:    {}", row.activity_score);
                    println!("Kills:         {}", row.secondary_score);
                    println!(
                        "Joined:        {}",
                        row.join_date
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "N/A".to_string())
                    );
                }
                None => println!("Clan rank:     N/A"),
            }
        }

        Command::Audit { target, apply } => {
            let (service, host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            let summary = service.audit(&ctx).await?;
            println!("{}", summary.text);

            if apply {
                let applied = service.apply_pending(&ctx, &summary.token).await?;
                println!(
                    "Applied {} changes ({} failed, {} members gone).",
                    applied.changed, applied.failed, applied.skipped
                );
                save_snapshot(host.as_ref(), ctx.community, &target.snapshot).await?;
            } else {
                service.cancel_pending(&ctx, &summary.token)?;
            }
        }

        Command::Sync { target } => {
            let (service, host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            let outcome = service.sync_now(&ctx).await?;
            println!(
                "Sync complete. Updated {} members. Unmatched: {}",
                outcome.changed,
                outcome.unmatched.len()
            );
            save_snapshot(host.as_ref(), ctx.community, &target.snapshot).await?;
        }

        Command::Watch { target, hours } => {
            let (service, host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            let job = service.schedule(&ctx, hours, None).await?;
            info!("Sync job {} running every {}h", job.job_id, job.interval.hours());

            tokio::signal::ctrl_c().await?;
            info!("Received shutdown signal");

            service.shutdown().await;
            save_snapshot(host.as_ref(), ctx.community, &target.snapshot).await?;
        }

        Command::CreateRoles { snapshot } => {
            let target = SnapshotArgs {
                snapshot,
                clan: None,
            };
            let (service, host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            let created = service.create_rank_roles(&ctx).await?;
            if created.is_empty() {
                println!("All rank roles already exist.");
            } else {
                println!("Created roles: {}", created.join(", "));
                save_snapshot(host.as_ref(), ctx.community, &target.snapshot).await?;
            }
        }

        Command::SetName {
            community,
            member,
            name,
        } => {
            let state = open_state(&args).await?;
            state
                .set_override(CommunityId(community), MemberId(member), &name)
                .await?;
            println!("Linked member {member} to roster name {}.", name.trim());
        }

        Command::Snapshot { community } => {
            let state = Arc::new(open_state(&args).await?);
            let service = build_service(&args, state, Arc::new(InMemoryHost::new()), roster, stats);
            let recorded = service
                .snapshot_now(&cli_context(CommunityId(community)))
                .await?;
            println!("Snapshot recorded for {recorded} linked players.");
        }

        Command::TopGainers { target, days } => {
            let window = gain_window(days)?;
            let (service, host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            let gains = service.top_gainers(&ctx, days).await?;
            println!("{}", top_gainers_text(window, &gains, |m| host.mention(m)));
        }

        Command::Inactive { target } => {
            let (service, _host, ctx) = open_snapshot(&args, &target, roster, stats).await?;
            service.snapshot_now(&ctx).await?;
            let inactive = service.inactive_members(&ctx).await?;
            for m in &inactive {
                println!("- member {} ({})", m.member_id, m.player);
            }
            println!("{} inactive members", inactive.len());
        }

        Command::SetInactive {
            community,
            days,
            channel,
        } => {
            let state = Arc::new(open_state(&args).await?);
            let service = build_service(&args, state, Arc::new(InMemoryHost::new()), roster, stats);
            let set = service
                .set_inactive_config(&cli_context(CommunityId(community)), days, ChannelId(channel))
                .await?;
            println!("{}", set.text);
        }
    }

    Ok(())
}

fn cli_context(community: CommunityId) -> CommandContext {
    CommandContext {
        community,
        requester: MemberId::default(),
        channel: ChannelId::default(),
    }
}

async fn open_state(args: &Args) -> anyhow::Result<AppState> {
    let store = JsonStore::open(&args.data_dir).await?;
    Ok(AppState::load(store).await?)
}

fn build_service(
    args: &Args,
    state: Arc<AppState>,
    host: Arc<InMemoryHost>,
    roster: Arc<dyn RosterSource>,
    stats: Arc<dyn PlayerStats>,
) -> RosterService {
    let host: Arc<dyn HostPlatform> = host;
    let reconciler = Reconciler::new(
        Arc::clone(&host),
        roster,
        RoleCatalog::default(),
        args.match_policy,
    );
    RosterService::new(state, reconciler, host, stats, ServiceConfig::default())
}

/// Load a snapshot into an in-memory host and wire a service around it
async fn open_snapshot(
    args: &Args,
    target: &SnapshotArgs,
    roster: Arc<dyn RosterSource>,
    stats: Arc<dyn PlayerStats>,
) -> anyhow::Result<(RosterService, Arc<InMemoryHost>, CommandContext)> {
    let json = tokio::fs::read_to_string(&target.snapshot)
        .await
        .with_context(|| format!("reading {}", target.snapshot.display()))?;
    let snapshot: CommunitySnapshot = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", target.snapshot.display()))?;
    let community = snapshot.community_id;
    info!(
        "Snapshot {}: {} members, {} roles",
        community,
        snapshot.members.len(),
        snapshot.roles.len()
    );

    let state = Arc::new(open_state(args).await?);
    let host = Arc::new(InMemoryHost::with_snapshot(snapshot).await);
    let service = build_service(args, state, Arc::clone(&host), roster, stats);
    let ctx = cli_context(community);

    if let Some(clan) = &target.clan {
        service.connect_roster(&ctx, clan).await?;
    }

    Ok((service, host, ctx))
}

async fn save_snapshot(host: &InMemoryHost, community: CommunityId, path: &Path) -> anyhow::Result<()> {
    let snapshot = host
        .snapshot(community)
        .await
        .with_context(|| format!("community {community} vanished"))?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Snapshot written to {}", path.display());
    Ok(())
}

fn print_roster(members: &[RosterMember]) {
    println!("{:<14} {:<14} {:>14} {:>8}  Joined", "Name", "Rank", "Clan score", "Kills");
    for m in members {
        println!(
            "{:<14} {:<14} {:>14} {:>8}  {}",
            m.display_name,
            m.rank,
            m.activity_score,
            m.secondary_score,
            m.join_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        );
    }
    println!("{} members", members.len());
}

fn or_na(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}
