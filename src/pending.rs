//! Pending change-set store
//!
//! Holds audit results awaiting explicit confirmation. Entries are keyed by an
//! opaque token and scoped to the community and requester that produced them.
//! There is no expiry: an abandoned proposal stays until it is applied,
//! cancelled, or the process restarts.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tracing::debug;

use crate::engine::RoleDelta;
use crate::types::{CommunityId, MemberId};

/// A proposed change-set awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub token: String,
    pub community_id: CommunityId,
    pub requester_id: MemberId,
    pub deltas: Vec<RoleDelta>,
}

/// Thread-safe store of pending change-sets
#[derive(Default)]
pub struct PendingStore {
    entries: DashMap<String, PendingChangeSet>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a change-set and return its token
    ///
    /// Tokens are `<unix millis>-<4 random digits>`, regenerated until unused.
    /// They are not secrets; scope checks on use are what protect an entry.
    pub fn add(
        &self,
        community_id: CommunityId,
        requester_id: MemberId,
        deltas: Vec<RoleDelta>,
    ) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let token = format!(
                "{}-{}",
                Utc::now().timestamp_millis(),
                rng.gen_range(1000..=9999)
            );
            if let Entry::Vacant(slot) = self.entries.entry(token.clone()) {
                debug!(token = %token, community = %community_id, deltas = deltas.len(), "Pending change-set stored");
                slot.insert(PendingChangeSet {
                    token: token.clone(),
                    community_id,
                    requester_id,
                    deltas,
                });
                return token;
            }
        }
    }

    pub fn get(&self, token: &str) -> Option<PendingChangeSet> {
        self.entries.get(token).map(|e| e.value().clone())
    }

    pub fn remove(&self, token: &str) -> Option<PendingChangeSet> {
        self.entries.remove(token).map(|(_, entry)| entry)
    }

    /// Atomically remove and return the entry if it belongs to this scope
    ///
    /// A token owned by another requester or community is left untouched and
    /// reported exactly like an unknown token.
    pub fn take_for(
        &self,
        token: &str,
        community_id: CommunityId,
        requester_id: MemberId,
    ) -> Option<PendingChangeSet> {
        self.entries
            .remove_if(token, |_, entry| {
                entry.community_id == community_id && entry.requester_id == requester_id
            })
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
