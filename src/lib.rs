//! Rollcall - clan roster reconciliation for chat communities
//!
//! Rollcall keeps the rank roles of a chat community in step with an
//! external clan roster. It fetches the roster, works out which rank role
//! every member should hold, and applies the difference, either after
//! explicit confirmation or on a schedule.
//!
//! ## Components
//!
//! - **Roster**: HTTP source and parser for the clan member list
//! - **Stats**: per-player totals from the hiscores endpoint
//! - **Activity**: score snapshots of linked players, gains and inactivity
//! - **Engine**: pure audit plus best-effort, idempotent apply
//! - **Pending**: audit results awaiting confirmation
//! - **Scheduler**: one recurring sync job per community
//! - **Service**: host-agnostic command entry points
//! - **Host**: the chat platform boundary, with an in-memory implementation

pub mod activity;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod host;
pub mod logging;
pub mod normalize;
pub mod pending;
pub mod roster;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod stats;
pub mod storage;
pub mod types;

pub use config::Args;
pub use engine::{audit, ApplyReport, AuditReport, Reconciler, RoleDelta, SyncOutcome};
pub use service::{CommandContext, RosterService, ScoreGain, ServiceConfig};
pub use state::AppState;
pub use types::{ChannelId, CommunityId, MemberId, RoleId, RollcallError, Result};
