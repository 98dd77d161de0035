//! Configuration for rollcall
//!
//! CLI arguments and environment variable handling using clap. Every option
//! can come from the environment (or a `.env` file) so the same binary runs
//! unchanged under a process supervisor.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::normalize::MatchPolicy;
use crate::roster::RosterClientConfig;
use crate::stats::StatsClientConfig;

/// rollcall - keep rank roles in step with the clan roster
#[derive(Parser, Debug, Clone)]
#[command(name = "rollcall")]
#[command(about = "Clan roster reconciliation for chat communities")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Directory holding community configuration and name overrides
    #[arg(long, env = "DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// Clan roster endpoint
    #[arg(
        long,
        env = "ROSTER_URL",
        default_value = "https://services.runescape.com/m=clan-hiscores/members_lite.ws",
        global = true
    )]
    pub roster_url: String,

    /// Player statistics endpoint
    #[arg(
        long,
        env = "STATS_URL",
        default_value = "https://secure.runescape.com/m=hiscore/index_lite.ws",
        global = true
    )]
    pub stats_url: String,

    /// Timeout for outbound HTTP requests in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000", global = true)]
    pub request_timeout_ms: u64,

    /// User-Agent sent to the roster and statistics endpoints
    #[arg(long, env = "USER_AGENT", default_value = concat!("rollcall/", env!("CARGO_PKG_VERSION")), global = true)]
    pub user_agent: String,

    /// Name matching policy (simple, strict)
    #[arg(long, env = "MATCH_POLICY", default_value = "simple", global = true)]
    pub match_policy: MatchPolicy,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch and print a clan roster
    Roster {
        /// Clan name as shown in-game
        clan: String,
    },

    /// Print statistics for a player, and their roster row if a clan is given
    Lookup {
        player: String,
        #[arg(long)]
        clan: Option<String>,
    },

    /// Audit a community snapshot against the roster
    Audit {
        #[command(flatten)]
        target: SnapshotArgs,
        /// Apply the proposed changes and write the snapshot back
        #[arg(long)]
        apply: bool,
    },

    /// Audit and apply in one step, then write the snapshot back
    Sync {
        #[command(flatten)]
        target: SnapshotArgs,
    },

    /// Sync on an interval until interrupted
    Watch {
        #[command(flatten)]
        target: SnapshotArgs,
        /// Hours between runs (1-168)
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Create any missing rank roles in a community snapshot
    CreateRoles {
        /// Community snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Match a member under a roster name instead of their display label
    SetName {
        #[arg(long)]
        community: u64,
        member: u64,
        name: String,
    },

    /// Record the total score of every linked player now
    Snapshot {
        #[arg(long)]
        community: u64,
    },

    /// Show the linked members with the largest score gain
    TopGainers {
        #[command(flatten)]
        target: SnapshotArgs,
        /// Days to look back (1-90)
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// List linked members without score gain over the inactivity threshold
    Inactive {
        #[command(flatten)]
        target: SnapshotArgs,
    },

    /// Set the inactivity threshold and the channel its summary goes to
    SetInactive {
        #[arg(long)]
        community: u64,
        /// Days without gain (clamped to 1-180)
        days: i64,
        channel: u64,
    },
}

/// A community snapshot file plus the clan it mirrors
#[derive(ClapArgs, Debug, Clone)]
pub struct SnapshotArgs {
    /// Community snapshot (JSON)
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Clan name; the community's stored clan is used when omitted
    #[arg(long)]
    pub clan: Option<String>,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn roster_client_config(&self) -> RosterClientConfig {
        RosterClientConfig {
            url: self.roster_url.clone(),
            request_timeout: self.request_timeout(),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn stats_client_config(&self) -> StatsClientConfig {
        StatsClientConfig {
            url: self.stats_url.clone(),
            request_timeout: self.request_timeout(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.roster_url.trim().is_empty() {
            return Err("ROSTER_URL must not be empty".to_string());
        }
        if self.stats_url.trim().is_empty() {
            return Err("STATS_URL must not be empty".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }
}
