//! Scheduled re-synchronization
//!
//! Each community can have at most one recurring sync job. A job runs one
//! sync immediately, reports to its summary channel if it has one, then waits
//! for its interval before running again. Starting a job for a community that
//! already has one replaces it: the old job is cancelled in the same map-slot
//! operation that installs the new one.
//!
//! Failures inside an iteration, panics included, are logged and the loop
//! carries on. A sync already in flight when its job is cancelled runs to
//! completion, but its summary is not posted. Only [`SyncScheduler::stop`], a replacement, or
//! [`SyncScheduler::shutdown`] ends a job.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::SyncOutcome;
use crate::types::{ChannelId, CommunityId, RollcallError, Result};

/// Shortest accepted interval, in hours
pub const MIN_INTERVAL_HOURS: u32 = 1;
/// Longest accepted interval (one week), in hours
pub const MAX_INTERVAL_HOURS: u32 = 168;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// A validated sync interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInterval(u32);

impl SyncInterval {
    /// Accept `hours` only within `MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS`
    pub fn from_hours(hours: i64) -> Result<Self> {
        let accepted = i64::from(MIN_INTERVAL_HOURS)..=i64::from(MAX_INTERVAL_HOURS);
        if !accepted.contains(&hours) {
            return Err(RollcallError::InvalidInterval {
                hours,
                min: MIN_INTERVAL_HOURS,
                max: MAX_INTERVAL_HOURS,
            });
        }
        Ok(Self(hours as u32))
    }

    pub fn hours(&self) -> u32 {
        self.0
    }

    pub fn period(&self) -> Duration {
        HOUR * self.0
    }
}

/// The work a sync job performs on every tick
#[async_trait]
pub trait ScheduledSync: Send + Sync {
    /// Audit and apply for one community
    async fn sync(&self, community: CommunityId) -> Result<SyncOutcome>;

    /// Post the outcome of a scheduled run
    async fn report(
        &self,
        community: CommunityId,
        channel: ChannelId,
        outcome: &SyncOutcome,
    ) -> Result<()>;
}

/// Public view of a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub job_id: Uuid,
    pub community_id: CommunityId,
    pub interval: SyncInterval,
    pub summary_channel: Option<ChannelId>,
}

struct SyncJob {
    info: JobInfo,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of every community's sync job
pub struct SyncScheduler {
    runner: Arc<dyn ScheduledSync>,
    jobs: DashMap<CommunityId, SyncJob>,
}

impl SyncScheduler {
    pub fn new(runner: Arc<dyn ScheduledSync>) -> Self {
        Self {
            runner,
            jobs: DashMap::new(),
        }
    }

    /// Start (or replace) the sync job of a community
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        community: CommunityId,
        interval: SyncInterval,
        summary_channel: Option<ChannelId>,
    ) -> JobInfo {
        let info = JobInfo {
            job_id: Uuid::new_v4(),
            community_id: community,
            interval,
            summary_channel,
        };

        // The slot stays locked from lookup to insert, so concurrent starts
        // for the same community serialize here.
        match self.jobs.entry(community) {
            Entry::Occupied(mut slot) => {
                let job = self.spawn_job(info.clone());
                let previous = slot.insert(job);
                previous.cancel.cancel();
                info!(
                    community = %community,
                    replaced = %previous.info.job_id,
                    job = %info.job_id,
                    hours = interval.hours(),
                    "Sync job replaced"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn_job(info.clone()));
                info!(
                    community = %community,
                    job = %info.job_id,
                    hours = interval.hours(),
                    "Sync job scheduled"
                );
            }
        }

        info
    }

    /// Stop a community's job; `false` if it had none
    pub fn stop(&self, community: CommunityId) -> bool {
        match self.jobs.remove(&community) {
            Some((_, job)) => {
                job.cancel.cancel();
                info!(community = %community, job = %job.info.job_id, "Sync job stopped");
                true
            }
            None => {
                debug!(community = %community, "No sync job to stop");
                false
            }
        }
    }

    pub fn job(&self, community: CommunityId) -> Option<JobInfo> {
        self.jobs.get(&community).map(|j| j.info.clone())
    }

    pub fn is_scheduled(&self, community: CommunityId) -> bool {
        self.jobs.contains_key(&community)
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Cancel every job and wait for their tasks to finish
    pub async fn shutdown(&self) {
        let communities: Vec<CommunityId> = self.jobs.iter().map(|e| *e.key()).collect();
        let mut handles = Vec::with_capacity(communities.len());
        for community in communities {
            if let Some((_, job)) = self.jobs.remove(&community) {
                job.cancel.cancel();
                handles.push(job.handle);
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync job ended abnormally");
            }
        }
        info!("Scheduler shut down");
    }

    fn spawn_job(&self, info: JobInfo) -> SyncJob {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.runner),
            info.clone(),
            cancel.clone(),
        ));
        SyncJob {
            info,
            cancel,
            handle,
        }
    }
}

async fn run_job(runner: Arc<dyn ScheduledSync>, info: JobInfo, cancel: CancellationToken) {
    let period = info.interval.period();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let iteration = AssertUnwindSafe(run_iteration(runner.as_ref(), &info, &cancel))
            .catch_unwind()
            .await;
        if let Err(panic) = iteration {
            error!(
                community = %info.community_id,
                job = %info.job_id,
                panic = %panic_message(panic.as_ref()),
                "Sync iteration panicked"
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }

    debug!(community = %info.community_id, job = %info.job_id, "Sync job loop exited");
}

async fn run_iteration(runner: &dyn ScheduledSync, info: &JobInfo, cancel: &CancellationToken) {
    let community = info.community_id;

    let outcome = match runner.sync(community).await {
        Ok(outcome) => outcome,
        Err(RollcallError::NotConfigured) => {
            debug!(community = %community, "No clan linked, scheduled sync skipped");
            return;
        }
        Err(e) => {
            warn!(community = %community, job = %info.job_id, error = %e, "Scheduled sync failed");
            return;
        }
    };

    info!(
        community = %community,
        changed = outcome.changed,
        unmatched = outcome.unmatched.len(),
        "Scheduled sync ran"
    );

    // A stopped or replaced job no longer owns the summary channel
    if cancel.is_cancelled() {
        debug!(community = %community, job = %info.job_id, "Job cancelled during sync, summary not posted");
        return;
    }

    if let Some(channel) = info.summary_channel {
        if let Err(e) = runner.report(community, channel, &outcome).await {
            warn!(community = %community, channel = %channel, error = %e, "Sync summary not delivered");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
