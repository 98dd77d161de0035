//! Reconciliation engine
//!
//! Computes which rank roles each community member should hold according to
//! the clan roster, and applies those changes to the host.
//!
//! ## Flow
//!
//! 1. [`audit`] is a pure function over a roster and a member/role snapshot.
//!    It returns one [`RoleDelta`] per member whose rank roles are wrong, and
//!    the members no roster entry could be found for.
//! 2. [`Reconciler::apply`] replays deltas against the live host state. Each
//!    member is handled independently; a failure is logged and the batch goes
//!    on.
//! 3. [`Reconciler::sync`] is audit followed by apply, with no confirmation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::RoleCatalog;
use crate::host::{CommunityMember, HostPlatform, Role};
use crate::normalize::{MatchPolicy, MatchStrategy};
use crate::roster::{RosterMember, RosterSource};
use crate::types::{CommunityId, HostError, MemberId, RoleId, RollcallError, Result};

/// One member's required rank role change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDelta {
    pub member_id: MemberId,
    pub desired_role_name: String,
    pub desired_role_id: RoleId,
    /// Other rank roles the member holds, in the order the host listed them
    pub role_ids_to_remove: Vec<RoleId>,
}

/// Output of [`audit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub deltas: Vec<RoleDelta>,
    /// Members whose resolved name is not on the roster
    pub unmatched: Vec<CommunityMember>,
}

/// Counters from one [`Reconciler::apply`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Members that had a role added or removed
    pub changed: usize,
    /// Members that left the community since the audit
    pub skipped: usize,
    /// Members where a host call failed
    pub failed: usize,
}

/// Output of [`Reconciler::sync`]
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub changed: usize,
    pub failed: usize,
    pub unmatched: Vec<CommunityMember>,
}

/// Roster rows indexed by comparison key, one map per match strategy
///
/// When two rows share a key the first one encountered wins.
pub struct RosterIndex<'a> {
    policy: MatchPolicy,
    passes: Vec<(MatchStrategy, HashMap<String, &'a RosterMember>)>,
}

impl<'a> RosterIndex<'a> {
    pub fn build(roster: &'a [RosterMember], policy: MatchPolicy) -> Self {
        let passes = policy
            .strategies()
            .iter()
            .map(|strategy| {
                let mut keyed = HashMap::with_capacity(roster.len());
                for row in roster {
                    let key = policy.key(*strategy, &row.display_name);
                    if !key.is_empty() {
                        keyed.entry(key).or_insert(row);
                    }
                }
                (*strategy, keyed)
            })
            .collect();

        Self { policy, passes }
    }

    /// Roster row for `name`, trying each strategy in order
    pub fn lookup(&self, name: &str) -> Option<&'a RosterMember> {
        self.passes.iter().find_map(|(strategy, keyed)| {
            let key = self.policy.key(*strategy, name);
            if key.is_empty() {
                return None;
            }
            keyed.get(&key).copied()
        })
    }
}

/// Compare a community against the roster
///
/// Pure: performs no host calls and returns the same report for the same
/// inputs. `overrides` maps members to an operator-supplied roster name that
/// replaces their display label for matching.
pub fn audit(
    members: &[CommunityMember],
    roles: &[Role],
    roster: &[RosterMember],
    overrides: &HashMap<MemberId, String>,
    catalog: &RoleCatalog,
    policy: MatchPolicy,
) -> AuditReport {
    let index = RosterIndex::build(roster, policy);
    let role_names: HashMap<RoleId, &str> =
        roles.iter().map(|r| (r.id, r.name.as_str())).collect();

    let mut report = AuditReport::default();

    for member in members.iter().filter(|m| !m.is_automated) {
        let name = overrides
            .get(&member.id)
            .map(String::as_str)
            .unwrap_or(&member.display_label);

        let Some(row) = index.lookup(name) else {
            report.unmatched.push(member.clone());
            continue;
        };

        // Rank has no role in this community yet
        let Some(desired) = catalog.resolve(&row.rank, roles) else {
            debug!(member = %member.id, rank = %row.rank, "No role for rank, skipping");
            continue;
        };

        let has_desired = member.has_role(desired.id);
        let to_remove: Vec<RoleId> = member
            .role_ids
            .iter()
            .copied()
            .filter(|id| *id != desired.id)
            .filter(|id| role_names.get(id).is_some_and(|n| catalog.contains(n)))
            .collect();

        if !has_desired || !to_remove.is_empty() {
            report.deltas.push(RoleDelta {
                member_id: member.id,
                desired_role_name: desired.name.clone(),
                desired_role_id: desired.id,
                role_ids_to_remove: to_remove,
            });
        }
    }

    report
}

/// Outcome of applying one delta
struct MemberApply {
    changed: bool,
    departed: bool,
    error: Option<HostError>,
}

/// Runs audits and applies their deltas against a host
pub struct Reconciler {
    host: Arc<dyn HostPlatform>,
    roster: Arc<dyn RosterSource>,
    catalog: RoleCatalog,
    policy: MatchPolicy,
}

impl Reconciler {
    pub fn new(
        host: Arc<dyn HostPlatform>,
        roster: Arc<dyn RosterSource>,
        catalog: RoleCatalog,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            host,
            roster,
            catalog,
            policy,
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Fetch the roster for `clan_name`
    pub async fn fetch_roster(&self, clan_name: &str) -> Result<Vec<RosterMember>> {
        self.roster
            .fetch_roster(clan_name)
            .await
            .ok_or_else(|| RollcallError::RosterUnavailable(clan_name.to_string()))
    }

    /// Fetch roster and host snapshot, then run [`audit`]
    pub async fn audit(
        &self,
        community: CommunityId,
        clan_name: &str,
        overrides: &HashMap<MemberId, String>,
    ) -> Result<AuditReport> {
        let roster = self.fetch_roster(clan_name).await?;
        let members = self.host.list_members(community).await?;
        let roles = self.host.list_roles(community).await?;

        let report = audit(&members, &roles, &roster, overrides, &self.catalog, self.policy);
        info!(
            community = %community,
            clan = %clan_name,
            roster = roster.len(),
            deltas = report.deltas.len(),
            unmatched = report.unmatched.len(),
            "Audit complete"
        );
        Ok(report)
    }

    /// Apply deltas in order, best effort
    ///
    /// Idempotent: membership is re-checked against the live host before every
    /// add or remove, so replaying the same deltas changes nothing.
    pub async fn apply(&self, community: CommunityId, deltas: &[RoleDelta]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for delta in deltas {
            let outcome = self.apply_one(community, delta).await;
            if outcome.changed {
                report.changed += 1;
            }
            if outcome.departed {
                report.skipped += 1;
            }
            if let Some(e) = outcome.error {
                warn!(
                    community = %community,
                    member = %delta.member_id,
                    role = %delta.desired_role_name,
                    error = %e,
                    "Role update failed"
                );
                report.failed += 1;
            }
        }

        info!(
            community = %community,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            "Applied role changes"
        );
        report
    }

    async fn apply_one(&self, community: CommunityId, delta: &RoleDelta) -> MemberApply {
        let mut outcome = MemberApply {
            changed: false,
            departed: false,
            error: None,
        };

        let member = match self.host.get_member(community, delta.member_id).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                debug!(member = %delta.member_id, "Member left, skipping");
                outcome.departed = true;
                return outcome;
            }
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };

        let roles = match self.host.list_roles(community).await {
            Ok(roles) => roles,
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };

        if !roles.iter().any(|r| r.id == delta.desired_role_id) {
            outcome.error = Some(HostError::RoleNotFound(delta.desired_role_id));
            return outcome;
        }

        if !member.has_role(delta.desired_role_id) {
            if let Err(e) = self
                .host
                .add_role(community, member.id, delta.desired_role_id)
                .await
            {
                outcome.error = Some(e);
                return outcome;
            }
            outcome.changed = true;
        }

        let to_remove: Vec<RoleId> = delta
            .role_ids_to_remove
            .iter()
            .copied()
            .filter(|id| member.has_role(*id) && roles.iter().any(|r| r.id == *id))
            .collect();

        if !to_remove.is_empty() {
            match self.host.remove_roles(community, member.id, &to_remove).await {
                Ok(()) => outcome.changed = true,
                Err(e) => outcome.error = Some(e),
            }
        }

        outcome
    }

    /// Audit then apply, without confirmation
    pub async fn sync(
        &self,
        community: CommunityId,
        clan_name: &str,
        overrides: &HashMap<MemberId, String>,
    ) -> Result<SyncOutcome> {
        let report = self.audit(community, clan_name, overrides).await?;
        let applied = self.apply(community, &report.deltas).await;

        Ok(SyncOutcome {
            changed: applied.changed,
            failed: applied.failed,
            unmatched: report.unmatched,
        })
    }
}
