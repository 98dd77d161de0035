//! In-memory host platform
//!
//! Backs the CLI snapshot mode and the test suites. Failures can be injected
//! per member or per operation, and every mutating call is counted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CommunityMember, HostPlatform, HostResult, Role};
use crate::types::{ChannelId, CommunityId, HostError, MemberId, RoleId};

/// Serializable state of one community
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySnapshot {
    pub community_id: CommunityId,
    #[serde(default)]
    pub members: Vec<CommunityMember>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub channels: Vec<ChannelId>,
}

/// Message recorded by [`InMemoryHost::send_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub community: CommunityId,
    pub channel: ChannelId,
    pub content: String,
}

/// Host platform kept entirely in memory
#[derive(Default)]
pub struct InMemoryHost {
    communities: RwLock<HashMap<CommunityId, CommunitySnapshot>>,
    sent: RwLock<Vec<SentMessage>>,
    failing_members: RwLock<HashSet<MemberId>>,
    fail_listing: AtomicBool,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host already holding `snapshot`
    pub async fn with_snapshot(snapshot: CommunitySnapshot) -> Self {
        let host = Self::new();
        host.insert_community(snapshot).await;
        host
    }

    /// Insert or replace a community
    pub async fn insert_community(&self, snapshot: CommunitySnapshot) {
        self.communities
            .write()
            .await
            .insert(snapshot.community_id, snapshot);
    }

    /// Current state of a community
    pub async fn snapshot(&self, community: CommunityId) -> Option<CommunitySnapshot> {
        self.communities.read().await.get(&community).cloned()
    }

    /// Role ids currently held by a member
    pub async fn member_roles(&self, community: CommunityId, member: MemberId) -> Vec<RoleId> {
        self.communities
            .read()
            .await
            .get(&community)
            .and_then(|c| c.members.iter().find(|m| m.id == member))
            .map(|m| m.role_ids.clone())
            .unwrap_or_default()
    }

    /// Simulate a member leaving the community
    pub async fn remove_member(&self, community: CommunityId, member: MemberId) {
        if let Some(c) = self.communities.write().await.get_mut(&community) {
            c.members.retain(|m| m.id != member);
        }
    }

    /// Simulate a role being deleted by a moderator
    pub async fn delete_role(&self, community: CommunityId, role: RoleId) {
        if let Some(c) = self.communities.write().await.get_mut(&community) {
            c.roles.retain(|r| r.id != role);
            for m in &mut c.members {
                m.role_ids.retain(|r| *r != role);
            }
        }
    }

    /// Make every role mutation on `member` fail with a permission error
    pub async fn fail_role_mutations_for(&self, member: MemberId) {
        self.failing_members.write().await.insert(member);
    }

    /// Make member listing fail with a transport error
    pub fn fail_member_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn check_mutation(&self, member: MemberId) -> HostResult<()> {
        if self.failing_members.read().await.contains(&member) {
            return Err(HostError::PermissionDenied(format!(
                "cannot edit roles of member {member}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl HostPlatform for InMemoryHost {
    async fn list_members(&self, community: CommunityId) -> HostResult<Vec<CommunityMember>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(HostError::Transport("member listing unavailable".to_string()));
        }
        self.communities
            .read()
            .await
            .get(&community)
            .map(|c| c.members.clone())
            .ok_or(HostError::CommunityNotFound(community))
    }

    async fn get_member(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> HostResult<Option<CommunityMember>> {
        let communities = self.communities.read().await;
        let c = communities
            .get(&community)
            .ok_or(HostError::CommunityNotFound(community))?;
        Ok(c.members.iter().find(|m| m.id == member).cloned())
    }

    async fn list_roles(&self, community: CommunityId) -> HostResult<Vec<Role>> {
        self.communities
            .read()
            .await
            .get(&community)
            .map(|c| c.roles.clone())
            .ok_or(HostError::CommunityNotFound(community))
    }

    async fn create_role(&self, community: CommunityId, name: &str) -> HostResult<Role> {
        let mut communities = self.communities.write().await;
        let c = communities
            .get_mut(&community)
            .ok_or(HostError::CommunityNotFound(community))?;
        let next = c.roles.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let role = Role {
            id: RoleId(next),
            name: name.to_string(),
        };
        c.roles.push(role.clone());
        debug!(community = %community, role = %role.id, name = %name, "Created role");
        Ok(role)
    }

    async fn add_role(
        &self,
        community: CommunityId,
        member: MemberId,
        role: RoleId,
    ) -> HostResult<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.check_mutation(member).await?;

        let mut communities = self.communities.write().await;
        let c = communities
            .get_mut(&community)
            .ok_or(HostError::CommunityNotFound(community))?;
        if !c.roles.iter().any(|r| r.id == role) {
            return Err(HostError::RoleNotFound(role));
        }
        let m = c
            .members
            .iter_mut()
            .find(|m| m.id == member)
            .ok_or_else(|| HostError::Transport(format!("unknown member {member}")))?;
        if !m.role_ids.contains(&role) {
            m.role_ids.push(role);
        }
        Ok(())
    }

    async fn remove_roles(
        &self,
        community: CommunityId,
        member: MemberId,
        roles: &[RoleId],
    ) -> HostResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.check_mutation(member).await?;

        let mut communities = self.communities.write().await;
        let c = communities
            .get_mut(&community)
            .ok_or(HostError::CommunityNotFound(community))?;
        let m = c
            .members
            .iter_mut()
            .find(|m| m.id == member)
            .ok_or_else(|| HostError::Transport(format!("unknown member {member}")))?;
        m.role_ids.retain(|r| !roles.contains(r));
        Ok(())
    }

    async fn send_message(
        &self,
        community: CommunityId,
        channel: ChannelId,
        content: &str,
    ) -> HostResult<()> {
        {
            let communities = self.communities.read().await;
            let c = communities
                .get(&community)
                .ok_or(HostError::CommunityNotFound(community))?;
            if !c.channels.contains(&channel) {
                return Err(HostError::ChannelNotFound(channel));
            }
        }
        self.sent.write().await.push(SentMessage {
            community,
            channel,
            content: content.to_string(),
        });
        Ok(())
    }
}
