//! SQLite database models

use crate::error::{AppError, Result};
use crate::provider::types::{BrokerAggregate, OrderBookSnapshot};
use crate::services::target_calculator::TargetFigures;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed message recorded when no accumulating broker was found
pub const NO_BROKER_DATA_MESSAGE: &str = "No broker data available";

/// Outcome of one symbol's analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Success => "success",
            AnalysisStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "success" => Ok(AnalysisStatus::Success),
            "error" => Ok(AnalysisStatus::Error),
            other => Err(AppError::Validation(format!(
                "Invalid status '{}'. Must be success or error",
                other
            ))),
        }
    }
}

/// Persisted unit of work, unique per (date, symbol)
///
/// Serialized with the `stock_queries` column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(rename = "from_date")]
    pub date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(rename = "emiten")]
    pub symbol: String,

    #[serde(rename = "bandar")]
    pub broker_code: Option<String>,
    #[serde(rename = "barang_bandar")]
    pub accumulated_lots: Option<i64>,
    #[serde(rename = "rata_rata_bandar")]
    pub average_accumulated_price: Option<f64>,

    #[serde(rename = "harga")]
    pub close_price: Option<f64>,
    #[serde(rename = "ara")]
    pub best_offer_price: Option<f64>,
    #[serde(rename = "arb")]
    pub best_bid_price: Option<f64>,
    #[serde(rename = "total_bid")]
    pub total_bid_lots: Option<i64>,
    #[serde(rename = "total_offer")]
    pub total_offer_lots: Option<i64>,

    #[serde(rename = "fraksi")]
    pub tick_size: Option<f64>,
    #[serde(rename = "total_papan")]
    pub board_count: Option<f64>,
    #[serde(rename = "rata_rata_bid_ofer")]
    pub average_bid_offer: Option<f64>,
    #[serde(rename = "a")]
    pub anchor_a: Option<f64>,
    #[serde(rename = "p")]
    pub anchor_p: Option<f64>,
    #[serde(rename = "target_realistis")]
    pub target_realistic: Option<f64>,
    pub target_max: Option<f64>,

    pub status: AnalysisStatus,
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    /// Successful analysis merging broker, order book and computed fields
    pub fn success(
        date: NaiveDate,
        symbol: &str,
        broker: &BrokerAggregate,
        book: &OrderBookSnapshot,
        figures: &TargetFigures,
    ) -> Self {
        Self {
            date,
            to_date: date,
            symbol: symbol.to_string(),
            broker_code: Some(broker.top_broker_code.clone()),
            accumulated_lots: Some(broker.accumulated_lots),
            average_accumulated_price: Some(broker.average_accumulated_price),
            close_price: Some(book.close_price),
            best_offer_price: Some(book.best_offer_price),
            best_bid_price: Some(book.best_bid_price),
            total_bid_lots: Some(book.total_bid_lots),
            total_offer_lots: Some(book.total_offer_lots),
            tick_size: Some(figures.tick_size),
            board_count: Some(figures.board_count),
            average_bid_offer: Some(figures.average_bid_offer),
            anchor_a: Some(figures.anchor_a),
            anchor_p: Some(figures.anchor_p),
            target_realistic: Some(figures.target_realistic),
            target_max: Some(figures.target_max),
            status: AnalysisStatus::Success,
            error_message: None,
        }
    }

    /// Error outcome carrying only the key and the message
    pub fn failure(date: NaiveDate, symbol: &str, message: &str) -> Self {
        Self {
            date,
            to_date: date,
            symbol: symbol.to_string(),
            broker_code: None,
            accumulated_lots: None,
            average_accumulated_price: None,
            close_price: None,
            best_offer_price: None,
            best_bid_price: None,
            total_bid_lots: None,
            total_offer_lots: None,
            tick_size: None,
            board_count: None,
            average_bid_offer: None,
            anchor_a: None,
            anchor_p: None,
            target_realistic: None,
            target_max: None,
            status: AnalysisStatus::Error,
            error_message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }
}

/// Stored analysis row as served by the history query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub id: i64,
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub created_at: String,
    pub updated_at: String,
}

/// Filters for the history query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFilter {
    #[serde(rename = "emiten")]
    pub symbol: Option<String>,
    #[serde(rename = "fromDate")]
    pub from_date: Option<NaiveDate>,
    #[serde(rename = "toDate")]
    pub to_date: Option<NaiveDate>,
    pub status: Option<AnalysisStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Manual classification of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagValue {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
    #[serde(rename = "Neutral")]
    Neutral,
}

impl FlagValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagValue::Ok => "OK",
            FlagValue::Ng => "NG",
            FlagValue::Neutral => "Neutral",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "OK" => Ok(FlagValue::Ok),
            "NG" => Ok(FlagValue::Ng),
            "Neutral" => Ok(FlagValue::Neutral),
            _ => Err(AppError::Validation(
                "Invalid flag value. Must be OK, NG, or Neutral".to_string(),
            )),
        }
    }
}

/// Flag row for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFlag {
    #[serde(rename = "emiten")]
    pub symbol: String,
    pub flag: FlagValue,
    pub updated_at: String,
}
