//! Typed market-data records
//!
//! Everything past the gateway boundary works with these types; raw provider
//! payloads never leave `provider::stockbit`.

use serde::{Deserialize, Serialize};

/// A tracked symbol for one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
}

impl WatchlistEntry {
    /// Create an entry, normalizing the symbol to upper case
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
        }
    }
}

/// Watchlist row as listed by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub symbol: String,
    pub company_name: String,
    pub last_price: f64,
    pub change_point: f64,
    pub change_percentage: f64,
    pub volume: f64,
    pub frequency: f64,
}

impl WatchlistItem {
    pub fn entry(&self) -> WatchlistEntry {
        WatchlistEntry::new(&self.symbol)
    }
}

/// User-defined watchlist group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistGroup {
    pub watchlist_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub category_type: String,
    #[serde(default)]
    pub total_items: i64,
}

/// Dominant net-buying broker ("bandar") over a date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAggregate {
    pub top_broker_code: String,
    pub accumulated_lots: i64,
    pub average_accumulated_price: f64,
}

/// Order book snapshot with the empty-book fallbacks already applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub close_price: f64,
    pub high_price: f64,
    /// Highest offer price (ARA), or `high_price` when the offer book is empty
    pub best_offer_price: f64,
    /// Lowest bid price (ARB), or 0 when the bid book is empty
    pub best_bid_price: f64,
    pub total_bid_lots: i64,
    pub total_offer_lots: i64,
}

impl OrderBookSnapshot {
    /// Build a snapshot from raw book levels
    pub fn from_levels(
        close_price: f64,
        high_price: f64,
        offer_prices: &[f64],
        bid_prices: &[f64],
        total_bid_lots: i64,
        total_offer_lots: i64,
    ) -> Self {
        let best_offer_price = offer_prices
            .iter()
            .copied()
            .filter(|p| p.is_finite())
            .reduce(f64::max)
            .unwrap_or(high_price);

        let best_bid_price = bid_prices
            .iter()
            .copied()
            .filter(|p| p.is_finite())
            .reduce(f64::min)
            .unwrap_or(0.0);

        Self {
            close_price,
            high_price,
            best_offer_price,
            best_bid_price,
            total_bid_lots,
            total_offer_lots,
        }
    }

    /// Bid lots normalized to board lots (÷100)
    pub fn bid_lots_100(&self) -> f64 {
        self.total_bid_lots as f64 / 100.0
    }

    /// Offer lots normalized to board lots (÷100)
    pub fn offer_lots_100(&self) -> f64 {
        self.total_offer_lots as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_symbol_is_uppercased() {
        assert_eq!(WatchlistEntry::new(" bbca ").symbol, "BBCA");
    }

    #[test]
    fn test_empty_offer_book_falls_back_to_high() {
        let snapshot = OrderBookSnapshot::from_levels(120.0, 125.0, &[], &[118.0, 119.0], 10, 0);
        assert_eq!(snapshot.best_offer_price, 125.0);
        assert!(!snapshot.best_offer_price.is_nan());
    }

    #[test]
    fn test_empty_bid_book_falls_back_to_zero() {
        let snapshot = OrderBookSnapshot::from_levels(120.0, 125.0, &[121.0], &[], 0, 10);
        assert_eq!(snapshot.best_bid_price, 0.0);
    }

    #[test]
    fn test_best_levels_pick_extremes() {
        let snapshot =
            OrderBookSnapshot::from_levels(9000.0, 9100.0, &[9025.0, 9050.0, 9075.0], &[8975.0, 8950.0], 500, 300);
        assert_eq!(snapshot.best_offer_price, 9075.0);
        assert_eq!(snapshot.best_bid_price, 8950.0);
        assert_eq!(snapshot.bid_lots_100(), 5.0);
        assert_eq!(snapshot.offer_lots_100(), 3.0);
    }
}
