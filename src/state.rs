//! Shared application state
//!
//! One container for everything request handlers and sync jobs share:
//! per-community configuration, operator name overrides, pending change-sets
//! and the activity history. Maps are sharded (`DashMap`) so every read-modify-write on a
//! key happens under that key's lock.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::activity::{ActivityLog, DEFAULT_INACTIVE_DAYS};
use crate::pending::PendingStore;
use crate::storage::JsonStore;
use crate::types::{ChannelId, CommunityId, MemberId, StorageError};

/// Document holding community configuration
pub const COMMUNITIES_DOC: &str = "communities.json";
/// Document holding name overrides
pub const OVERRIDES_DOC: &str = "name_overrides.json";

/// Per-community settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Linked clan, if any
    #[serde(default)]
    pub clan_name: Option<String>,
    /// Channel scheduled syncs report to
    #[serde(default)]
    pub summary_channel_id: Option<ChannelId>,
    /// Days without score gain before a linked member counts as inactive
    #[serde(default)]
    pub inactive_days_threshold: Option<u32>,
    /// Channel the inactive-member summary goes to
    #[serde(default)]
    pub inactive_summary_channel_id: Option<ChannelId>,
}

impl CommunityConfig {
    /// Linked clan name, ignoring blank values
    pub fn clan(&self) -> Option<&str> {
        self.clan_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn inactive_days(&self) -> u32 {
        self.inactive_days_threshold.unwrap_or(DEFAULT_INACTIVE_DAYS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommunityRecord {
    community_id: CommunityId,
    #[serde(flatten)]
    config: CommunityConfig,
}

/// Persisted form of one name override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOverride {
    pub community_id: CommunityId,
    pub member_id: MemberId,
    pub name: String,
}

/// Application state shared by commands and sync jobs
pub struct AppState {
    communities: DashMap<CommunityId, CommunityConfig>,
    overrides: DashMap<(CommunityId, MemberId), String>,
    pending: PendingStore,
    activity: ActivityLog,
    store: Option<JsonStore>,
    persist_lock: Mutex<()>,
}

impl AppState {
    /// State that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            communities: DashMap::new(),
            overrides: DashMap::new(),
            pending: PendingStore::new(),
            activity: ActivityLog::in_memory(),
            store: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Restore state from `store`; later mutations are saved back to it
    pub async fn load(store: JsonStore) -> Result<Self, StorageError> {
        let communities: Vec<CommunityRecord> = store.load(COMMUNITIES_DOC).await?;
        let overrides: Vec<NameOverride> = store.load(OVERRIDES_DOC).await?;

        info!(
            communities = communities.len(),
            overrides = overrides.len(),
            dir = %store.base_dir().display(),
            "State restored"
        );

        let state = Self {
            activity: ActivityLog::load(store.clone()).await?,
            store: Some(store),
            ..Self::in_memory()
        };
        for record in communities {
            state.communities.insert(record.community_id, record.config);
        }
        for o in overrides {
            state.overrides.insert((o.community_id, o.member_id), o.name);
        }
        Ok(state)
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Configuration of a community (default if never configured)
    pub fn config(&self, community: CommunityId) -> CommunityConfig {
        self.communities
            .get(&community)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Mutate a community's configuration under its lock and persist
    pub async fn update_config<F>(
        &self,
        community: CommunityId,
        mutate: F,
    ) -> Result<CommunityConfig, StorageError>
    where
        F: FnOnce(&mut CommunityConfig),
    {
        let updated = {
            let mut entry = self.communities.entry(community).or_default();
            mutate(entry.value_mut());
            entry.value().clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    /// Set the roster name used for a member and persist
    pub async fn set_override(
        &self,
        community: CommunityId,
        member: MemberId,
        name: &str,
    ) -> Result<(), StorageError> {
        self.overrides
            .insert((community, member), name.trim().to_string());
        debug!(community = %community, member = %member, "Name override set");
        self.persist().await
    }

    /// All overrides of one community, keyed by member
    pub fn overrides_for(&self, community: CommunityId) -> HashMap<MemberId, String> {
        self.overrides
            .iter()
            .filter(|e| e.key().0 == community)
            .map(|e| (e.key().1, e.value().clone()))
            .collect()
    }

    /// Write communities and overrides to the store, if there is one
    pub async fn persist(&self) -> Result<(), StorageError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;

        let mut communities: Vec<CommunityRecord> = self
            .communities
            .iter()
            .map(|e| CommunityRecord {
                community_id: *e.key(),
                config: e.value().clone(),
            })
            .collect();
        communities.sort_by_key(|r| r.community_id);

        let mut overrides: Vec<NameOverride> = self
            .overrides
            .iter()
            .map(|e| NameOverride {
                community_id: e.key().0,
                member_id: e.key().1,
                name: e.value().clone(),
            })
            .collect();
        overrides.sort_by_key(|o| (o.community_id, o.member_id));

        store.save(COMMUNITIES_DOC, &communities).await?;
        store.save(OVERRIDES_DOC, &overrides).await
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
