//! Raw Stockbit payloads and their normalization
//!
//! The provider sends most numbers as strings, sometimes with thousands
//! separators, and wraps some responses in `data` but not others. All of
//! that is resolved here.

use crate::error::{AppError, Result};
use crate::provider::types::{BrokerAggregate, OrderBookSnapshot, WatchlistGroup, WatchlistItem};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Flexible numbers
// ============================================================================

/// Parse "1,234.5" style numbers
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn deserialize_flexible_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match FlexibleFloat::deserialize(deserializer)? {
        FlexibleFloat::Float(f) => Ok(f),
        FlexibleFloat::Int(i) => Ok(i as f64),
        FlexibleFloat::Str(s) => parse_number(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a number: {:?}", s))),
    }
}

fn deserialize_optional_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleOptFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match Option::<FlexibleOptFloat>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FlexibleOptFloat::Float(f)) => Ok(Some(f)),
        Some(FlexibleOptFloat::Int(i)) => Ok(Some(i as f64)),
        Some(FlexibleOptFloat::Str(s)) => Ok(parse_number(&s)),
    }
}

/// Strip the optional `data` wrapper
fn unwrap_data(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_object() || inner.is_array() => inner,
        _ => value,
    }
}

// ============================================================================
// Market detector (broker summary)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawMarketDetector {
    broker_summary: Option<RawBrokerSummary>,
}

#[derive(Debug, Deserialize)]
struct RawBrokerSummary {
    #[serde(default)]
    brokers_buy: Vec<RawBrokerBuy>,
}

#[derive(Debug, Deserialize)]
struct RawBrokerBuy {
    netbs_broker_code: String,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    bval: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    blot: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    netbs_buy_avg_price: Option<f64>,
}

/// Pick the dominant accumulating broker from a market-detector payload
///
/// The winner is the buyer with the largest buy value among entries whose
/// lots and average price are both positive.
pub fn parse_top_broker(symbol: &str, payload: &Value) -> Result<Option<BrokerAggregate>> {
    let detector: RawMarketDetector = serde_json::from_value(unwrap_data(payload).clone())
        .map_err(|e| AppError::Upstream(format!("Malformed broker summary for {}: {}", symbol, e)))?;

    let buys = match detector.broker_summary {
        Some(summary) => summary.brokers_buy,
        None => return Ok(None),
    };

    let top = buys
        .into_iter()
        .filter(|b| !b.netbs_broker_code.trim().is_empty())
        .filter_map(|b| {
            let lots = b.blot?;
            let avg = b.netbs_buy_avg_price?;
            (lots > 0.0 && avg > 0.0).then(|| (b.bval.unwrap_or(0.0), b.netbs_broker_code, lots, avg))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0));

    Ok(top.map(|(_, code, lots, avg)| BrokerAggregate {
        top_broker_code: code.trim().to_string(),
        accumulated_lots: lots.round() as i64,
        average_accumulated_price: avg.round(),
    }))
}

// ============================================================================
// Order book
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawOrderBook {
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    close: f64,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    high: Option<f64>,
    #[serde(default)]
    offer: Vec<RawLevel>,
    #[serde(default)]
    bid: Vec<RawLevel>,
    total_bid_offer: RawTotals,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTotals {
    bid: RawLot,
    offer: RawLot,
}

#[derive(Debug, Deserialize)]
struct RawLot {
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    lot: f64,
}

/// Normalize an order book payload into a typed snapshot
pub fn parse_order_book(symbol: &str, payload: &Value) -> Result<OrderBookSnapshot> {
    let raw: RawOrderBook = serde_json::from_value(unwrap_data(payload).clone())
        .map_err(|e| AppError::Upstream(format!("Malformed orderbook for {}: {}", symbol, e)))?;

    if raw.close < 0.0 || raw.total_bid_offer.bid.lot < 0.0 || raw.total_bid_offer.offer.lot < 0.0 {
        return Err(AppError::Upstream(format!(
            "Negative price or lot total in orderbook for {}",
            symbol
        )));
    }

    let offer_prices: Vec<f64> = raw.offer.iter().filter_map(|l| l.price).collect();
    let bid_prices: Vec<f64> = raw.bid.iter().filter_map(|l| l.price).collect();

    Ok(OrderBookSnapshot::from_levels(
        raw.close,
        raw.high.unwrap_or(0.0),
        &offer_prices,
        &bid_prices,
        raw.total_bid_offer.bid.lot.round() as i64,
        raw.total_bid_offer.offer.lot.round() as i64,
    ))
}

// ============================================================================
// Watchlist
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawWatchlistDetail {
    #[serde(default)]
    result: Vec<RawWatchlistItem>,
}

#[derive(Debug, Deserialize)]
struct RawWatchlistItem {
    symbol: Option<String>,
    company_code: Option<String>,
    #[serde(default)]
    company_name: String,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    last_price: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    change_point: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    change_percentage: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    volume: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_f64", default)]
    frequency: Option<f64>,
}

/// Normalize a watchlist detail payload, skipping items without a symbol
pub fn parse_watchlist(payload: &Value) -> Result<Vec<WatchlistItem>> {
    let detail: RawWatchlistDetail = serde_json::from_value(unwrap_data(payload).clone())
        .map_err(|e| AppError::Upstream(format!("Malformed watchlist: {}", e)))?;

    let items = detail
        .result
        .into_iter()
        .filter_map(|item| {
            let symbol = item
                .symbol
                .filter(|s| !s.trim().is_empty())
                .or(item.company_code.filter(|s| !s.trim().is_empty()));

            let Some(symbol) = symbol else {
                tracing::warn!("Skipping watchlist item without symbol: {}", item.company_name);
                return None;
            };

            Some(WatchlistItem {
                symbol: symbol.trim().to_uppercase(),
                company_name: item.company_name,
                last_price: item.last_price.unwrap_or(0.0),
                change_point: item.change_point.unwrap_or(0.0),
                change_percentage: item.change_percentage.unwrap_or(0.0),
                volume: item.volume.unwrap_or(0.0),
                frequency: item.frequency.unwrap_or(0.0),
            })
        })
        .collect();

    Ok(items)
}

/// Normalize the watchlist group listing
pub fn parse_watchlist_groups(payload: &Value) -> Result<Vec<WatchlistGroup>> {
    serde_json::from_value(unwrap_data(payload).clone())
        .map_err(|e| AppError::Upstream(format!("Malformed watchlist groups: {}", e)))
}

/// Extract the sector from an emitten info payload
pub fn parse_sector(payload: &Value) -> Option<String> {
    unwrap_data(payload)
        .get("sector")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
