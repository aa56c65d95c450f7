//! Stockbit market-data adapter

pub mod payload;

use crate::db::sqlite::{SqliteDb, PROVIDER_TOKEN_KEY};
use crate::error::{AppError, Result};
use crate::provider::types::*;
use crate::provider::{MarketDataGateway, WatchlistSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const WATCHLIST_PAGE_LIMIT: &str = "500";
const BROKER_SUMMARY_LIMIT: &str = "25";

/// Stockbit HTTP client implementing both provider traits
pub struct StockbitClient {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
    /// Source of rotated tokens, read before every request
    session: Option<Arc<SqliteDb>>,
}

impl StockbitClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Config(format!("Invalid provider URL {}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(token),
            session: None,
        })
    }

    /// Pick up tokens saved to the session table after startup
    pub fn with_session_store(mut self, sqlite: Arc<SqliteDb>) -> Self {
        self.session = Some(sqlite);
        self
    }

    /// Latest session token, else the last one seen
    fn current_token(&self) -> Result<String> {
        if let Some(ref sqlite) = self.session {
            match sqlite.get_session_value(PROVIDER_TOKEN_KEY) {
                Ok(Some(saved)) => *self.token.write() = Some(saved),
                Ok(None) => {}
                Err(e) => warn!("Failed to read provider token from session: {}", e),
            }
        }

        self.token
            .read()
            .clone()
            .ok_or_else(|| AppError::Upstream("Provider token is not configured".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Failed to build URL for {}: {}", path, e)))
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let token = self.current_token()?;

        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Request to {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(AppError::Upstream(
                "Provider token expired or invalid".to_string(),
            )),
            status if !status.is_success() => Err(AppError::Upstream(format!(
                "{} returned HTTP {}",
                path,
                status.as_u16()
            ))),
            _ => response
                .json::<Value>()
                .await
                .map_err(|e| AppError::Upstream(format!("Invalid JSON from {}: {}", path, e))),
        }
    }

    async fn default_watchlist_id(&self) -> Result<i64> {
        let groups = self.fetch_watchlist_groups().await?;
        groups
            .iter()
            .find(|g| g.is_default)
            .or_else(|| groups.first())
            .map(|g| g.watchlist_id)
            .ok_or_else(|| AppError::NotFound("No watchlist groups found".to_string()))
    }
}

#[async_trait]
impl MarketDataGateway for StockbitClient {
    async fn fetch_broker_aggregate(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<BrokerAggregate>> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        let path = format!("marketdetectors/{}", urlencoding::encode(symbol));

        let payload = self
            .get_json(
                &path,
                &[
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                    ("transaction_type", "TRANSACTION_TYPE_NET"),
                    ("market_board", "MARKET_BOARD_REGULER"),
                    ("investor_type", "INVESTOR_TYPE_ALL"),
                    ("limit", BROKER_SUMMARY_LIMIT),
                ],
            )
            .await?;

        payload::parse_top_broker(symbol, &payload)
    }

    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
        let path = format!(
            "company-price-feed/v2/orderbook/companies/{}",
            urlencoding::encode(symbol)
        );
        let payload = self.get_json(&path, &[]).await?;
        payload::parse_order_book(symbol, &payload)
    }

    async fn fetch_sector(&self, symbol: &str) -> Result<Option<String>> {
        let path = format!("emitten/{}/info", urlencoding::encode(symbol));
        let payload = self.get_json(&path, &[]).await?;
        Ok(payload::parse_sector(&payload))
    }
}

#[async_trait]
impl WatchlistSource for StockbitClient {
    async fn fetch_watchlist(&self, group_id: Option<i64>) -> Result<Vec<WatchlistItem>> {
        let watchlist_id = match group_id {
            Some(id) => id,
            None => self.default_watchlist_id().await?,
        };

        let path = format!("watchlist/{}", watchlist_id);
        let payload = self
            .get_json(&path, &[("page", "1"), ("limit", WATCHLIST_PAGE_LIMIT)])
            .await?;

        payload::parse_watchlist(&payload)
    }

    async fn fetch_watchlist_groups(&self) -> Result<Vec<WatchlistGroup>> {
        let payload = self
            .get_json("watchlist", &[("page", "1"), ("limit", WATCHLIST_PAGE_LIMIT)])
            .await?;
        payload::parse_watchlist_groups(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            StockbitClient::new("https://example.test/api", None, Duration::from_secs(5)).unwrap();
        let url = client.endpoint("watchlist/7").unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/watchlist/7");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = StockbitClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_token_is_upstream_error() {
        let client =
            StockbitClient::new("https://example.test", None, Duration::from_secs(5)).unwrap();

        let err = client.fetch_order_book("BBCA").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[test]
    fn test_rotated_session_token_is_used() {
        let sqlite = Arc::new(SqliteDb::open_in_memory().unwrap());
        let client = StockbitClient::new(
            "https://example.test",
            Some("startup".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_session_store(sqlite.clone());

        assert_eq!(client.current_token().unwrap(), "startup");

        sqlite.upsert_session(PROVIDER_TOKEN_KEY, "rotated").unwrap();
        assert_eq!(client.current_token().unwrap(), "rotated");
    }

    #[test]
    fn test_token_saved_after_startup_is_picked_up() {
        let sqlite = Arc::new(SqliteDb::open_in_memory().unwrap());
        let client = StockbitClient::new("https://example.test", None, Duration::from_secs(5))
            .unwrap()
            .with_session_store(sqlite.clone());

        assert!(client.current_token().is_err());

        sqlite.upsert_session(PROVIDER_TOKEN_KEY, "fresh").unwrap();
        assert_eq!(client.current_token().unwrap(), "fresh");
    }
}
