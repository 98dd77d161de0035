//! Player statistics source
//!
//! Per-player totals from the hiscores `index_lite` endpoint. The payload is
//! one `rank,level,score` row per skill; the first row is the overall total.
//! Any failure yields `None`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Column of the overall rank in the first row
const RANK_COLUMN: usize = 0;
/// Column of the total score in the first row
const TOTAL_COLUMN: usize = 2;

/// Anything that can look up player statistics
#[async_trait]
pub trait PlayerStats: Send + Sync {
    /// Overall total score of a player
    async fn total_score(&self, player: &str) -> Option<i64>;

    /// Overall hiscore rank of a player, `None` when unranked
    async fn overall_rank(&self, player: &str) -> Option<i64>;
}

/// Configuration for the statistics client
#[derive(Debug, Clone)]
pub struct StatsClientConfig {
    /// Statistics endpoint; the player name is passed as `player`
    pub url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for StatsClientConfig {
    fn default() -> Self {
        Self {
            url: "https://secure.runescape.com/m=hiscore/index_lite.ws".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("rollcall/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Statistics source backed by an HTTP GET
pub struct HttpStatsSource {
    config: StatsClientConfig,
    http_client: reqwest::Client,
}

impl HttpStatsSource {
    pub fn new(config: StatsClientConfig) -> Self {
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
        Self::new(StatsClientConfig::default())
    }

    async fn fetch(&self, player: &str) -> Option<String> {
        let response = match self
            .http_client
            .get(&self.config.url)
            .query(&[("player", player)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(player = %player, error = %e, "Stats request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(player = %player, status = %response.status(), "Stats lookup rejected");
            return None;
        }

        response.text().await.ok()
    }
}

#[async_trait]
impl PlayerStats for HttpStatsSource {
    async fn total_score(&self, player: &str) -> Option<i64> {
        let body = self.fetch(player).await?;
        first_row_column(&body, TOTAL_COLUMN)
    }

    async fn overall_rank(&self, player: &str) -> Option<i64> {
        let body = self.fetch(player).await?;
        first_row_column(&body, RANK_COLUMN).filter(|rank| *rank >= 0)
    }
}

/// Integer in `column` of the first row of a delimited payload
pub fn first_row_column(body: &str, column: usize) -> Option<i64> {
    let first = body.lines().next()?;
    let cells: Vec<&str> = first.split(',').collect();
    // A valid overall row always carries rank, level and score
    if cells.len() < 3 {
        return None;
    }
    cells.get(column)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_row_column() {
        let body = "1234,2898,5600000000\n5,99,200000000\n";
        assert_eq!(first_row_column(body, TOTAL_COLUMN), Some(5_600_000_000));
        assert_eq!(first_row_column(body, RANK_COLUMN), Some(1234));
    }

    #[test]
    fn test_first_row_column_rejects_garbage() {
        assert_eq!(first_row_column("", TOTAL_COLUMN), None);
        assert_eq!(first_row_column("<html>", TOTAL_COLUMN), None);
        assert_eq!(first_row_column("1,2", TOTAL_COLUMN), None);
        assert_eq!(first_row_column("1,2,abc", TOTAL_COLUMN), None);
    }

    #[test]
    fn test_unranked_is_negative() {
        assert_eq!(first_row_column("-1,1,0", RANK_COLUMN), Some(-1));
    }
}
