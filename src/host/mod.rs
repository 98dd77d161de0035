//! Host platform boundary
//!
//! The chat platform owns members, roles and channels. Rollcall only talks to
//! it through [`HostPlatform`], and treats every call as fallible.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, CommunityId, HostError, MemberId, RoleId};

pub use memory::{CommunitySnapshot, InMemoryHost};

/// Result of a host platform call
pub type HostResult<T> = std::result::Result<T, HostError>;

/// A member of a community as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub id: MemberId,
    /// Bots and integrations are never reconciled
    #[serde(default)]
    pub is_automated: bool,
    /// Nickname if set, otherwise the account name
    pub display_label: String,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

impl CommunityMember {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.role_ids.contains(&role)
    }
}

/// A group role defined in a community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Operations Rollcall needs from the chat platform
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// All members of the community, automated accounts included
    async fn list_members(&self, community: CommunityId) -> HostResult<Vec<CommunityMember>>;

    /// Live view of one member, `None` if they left
    async fn get_member(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> HostResult<Option<CommunityMember>>;

    /// All roles in the community, in host order
    async fn list_roles(&self, community: CommunityId) -> HostResult<Vec<Role>>;

    /// Create a role with no permissions
    async fn create_role(&self, community: CommunityId, name: &str) -> HostResult<Role>;

    async fn add_role(
        &self,
        community: CommunityId,
        member: MemberId,
        role: RoleId,
    ) -> HostResult<()>;

    /// Remove several roles from a member in one call
    async fn remove_roles(
        &self,
        community: CommunityId,
        member: MemberId,
        roles: &[RoleId],
    ) -> HostResult<()>;

    async fn send_message(
        &self,
        community: CommunityId,
        channel: ChannelId,
        content: &str,
    ) -> HostResult<()>;

    /// Inline mention of a member in message text
    fn mention(&self, member: MemberId) -> String {
        format!("<@{member}>")
    }

    /// Inline mention of a channel in message text
    fn mention_channel(&self, channel: ChannelId) -> String {
        format!("<#{channel}>")
    }
}
