//! Market-data provider module
//!
//! The analysis pipeline talks to the outside world only through the two
//! traits below. `stockbit` is the HTTP implementation.

pub mod types;
pub mod stockbit;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use types::*;

/// Broker-accumulation and order-book data for a symbol
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Dominant net-buying broker for the window, `None` if none qualifies
    async fn fetch_broker_aggregate(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<BrokerAggregate>>;

    /// Current order book snapshot
    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot>;

    /// Sector name for a symbol, if the provider knows it
    async fn fetch_sector(&self, symbol: &str) -> Result<Option<String>>;
}

/// Supplier of tracked symbols
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    /// Items of a watchlist group, or of the default group when `group_id` is `None`
    async fn fetch_watchlist(&self, group_id: Option<i64>) -> Result<Vec<WatchlistItem>>;

    /// All watchlist groups of the account
    async fn fetch_watchlist_groups(&self) -> Result<Vec<WatchlistGroup>>;
}
