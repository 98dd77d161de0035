//! HTTP roster source
//!
//! Fetches the clan member list from the clan hiscores `members_lite`
//! endpoint.
//!
//! A successful response with no readable rows (an empty body, or only the
//! header line) is reported as unavailable, not as an empty roster. An empty
//! roster would make every member of the community look unmatched.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::parse::{decode_latin1, parse_roster};
use super::{RosterMember, RosterSource};

/// Configuration for the roster client
#[derive(Debug, Clone)]
pub struct RosterClientConfig {
    /// Roster endpoint; the clan name is passed as `clanName`
    pub url: String,
    /// Timeout for the whole request
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for RosterClientConfig {
    fn default() -> Self {
        Self {
            url: "https://services.runescape.com/m=clan-hiscores/members_lite.ws".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("rollcall/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Roster source backed by an HTTP GET
pub struct HttpRosterSource {
    config: RosterClientConfig,
    http_client: reqwest::Client,
}

impl HttpRosterSource {
    pub fn new(config: RosterClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RosterClientConfig::default())
    }

    async fn fetch_bytes(&self, clan_name: &str) -> Result<Vec<u8>, String> {
        let response = self
            .http_client
            .get(&self.config.url)
            .query(&[("clanName", clan_name)])
            .send()
            .await
            .map_err(|e| format!("network error: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| format!("body read failed: {e}"))
    }
}

#[async_trait]
impl RosterSource for HttpRosterSource {
    async fn fetch_roster(&self, clan_name: &str) -> Option<Vec<RosterMember>> {
        let bytes = match self.fetch_bytes(clan_name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(clan = %clan_name, error = %e, "Roster fetch failed");
                return None;
            }
        };

        let members = parse_roster(&decode_latin1(&bytes));
        if members.is_empty() {
            warn!(clan = %clan_name, bytes = bytes.len(), "Roster payload had no readable rows");
            return None;
        }

        debug!(clan = %clan_name, members = members.len(), "Roster fetched");
        Some(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RosterClientConfig::default();
        assert!(config.url.ends_with("members_lite.ws"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("rollcall/"));
    }
}
