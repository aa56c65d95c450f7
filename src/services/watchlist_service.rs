//! Watchlist Service
//!
//! Lists the provider watchlist enriched with sector and flag, and the
//! watchlist groups.

use crate::db::sqlite::models::FlagValue;
use crate::error::Result;
use crate::provider::types::{WatchlistGroup, WatchlistItem};
use crate::state::AppState;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Watchlist row with sector and flag attached
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistView {
    #[serde(flatten)]
    pub item: WatchlistItem,
    pub sector: Option<String>,
    pub flag: Option<FlagValue>,
}

/// Watchlist service for business logic
pub struct WatchlistService;

impl WatchlistService {
    /// Watchlist items with sector and flag
    ///
    /// Sector lookups run concurrently. A failed lookup leaves the sector unset.
    pub async fn list(state: &AppState, group_id: Option<i64>) -> Result<Vec<WatchlistView>> {
        info!("WatchlistService::list - group_id={:?}", group_id);

        let items = state.watchlist.fetch_watchlist(group_id).await?;

        let sectors = join_all(items.iter().map(|item| async move {
            match state.gateway.fetch_sector(&item.symbol).await {
                Ok(sector) => sector,
                Err(e) => {
                    debug!("Sector lookup failed for {}: {}", item.symbol, e);
                    None
                }
            }
        }))
        .await;

        let symbols: Vec<String> = items.iter().map(|item| item.entry().symbol).collect();
        let flags = match state.sqlite.get_flags(&symbols) {
            Ok(flags) => flags,
            Err(e) => {
                warn!("Failed to load flags: {}", e);
                Default::default()
            }
        };

        Ok(items
            .into_iter()
            .zip(sectors)
            .map(|(item, sector)| {
                let flag = flags.get(&item.entry().symbol).copied();
                WatchlistView { item, sector, flag }
            })
            .collect())
    }

    pub async fn groups(state: &AppState) -> Result<Vec<WatchlistGroup>> {
        info!("WatchlistService::groups");
        state.watchlist.fetch_watchlist_groups().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::sqlite::SqliteDb;
    use crate::error::AppError;
    use crate::provider::types::{BrokerAggregate, OrderBookSnapshot};
    use crate::provider::{MarketDataGateway, WatchlistSource};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;

    struct FakeProvider;

    #[async_trait]
    impl MarketDataGateway for FakeProvider {
        async fn fetch_broker_aggregate(
            &self,
            _symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Option<BrokerAggregate>> {
            Ok(None)
        }

        async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
            Err(AppError::Upstream(format!("no book for {}", symbol)))
        }

        async fn fetch_sector(&self, symbol: &str) -> Result<Option<String>> {
            match symbol {
                "BBCA" => Ok(Some("Finance".to_string())),
                "TLKM" => Err(AppError::Upstream("sector lookup failed".to_string())),
                _ => Ok(None),
            }
        }
    }

    #[async_trait]
    impl WatchlistSource for FakeProvider {
        async fn fetch_watchlist(&self, _group_id: Option<i64>) -> Result<Vec<WatchlistItem>> {
            Ok(["BBCA", "TLKM", "GOTO"]
                .iter()
                .map(|s| WatchlistItem {
                    symbol: s.to_string(),
                    company_name: format!("{} Tbk", s),
                    last_price: 1000.0,
                    change_point: 0.0,
                    change_percentage: 0.0,
                    volume: 0.0,
                    frequency: 0.0,
                })
                .collect())
        }

        async fn fetch_watchlist_groups(&self) -> Result<Vec<WatchlistGroup>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_list_enriches_with_sector_and_flag() {
        let provider = Arc::new(FakeProvider);
        let state = AppState::with_components(
            AppConfig::for_testing(),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            provider.clone(),
            provider,
        );
        state.sqlite.upsert_flag("TLKM", FlagValue::Ng).unwrap();

        let views = WatchlistService::list(&state, None).await.unwrap();

        assert_eq!(views.len(), 3);
        assert_eq!(views[0].sector.as_deref(), Some("Finance"));
        assert_eq!(views[0].flag, None);
        assert_eq!(views[1].sector, None);
        assert_eq!(views[1].flag, Some(FlagValue::Ng));

        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["symbol"], "BBCA");
        assert_eq!(json["sector"], "Finance");
        assert!(json["flag"].is_null());
    }
}
