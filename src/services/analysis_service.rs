//! Analysis Service
//!
//! Runs the daily watchlist batch: for each symbol fetch the broker
//! aggregate and order book, compute targets, persist one row. A failing
//! symbol is recorded as an error row and the batch moves on.

use crate::db::sqlite::models::{AnalysisRecord, AnalysisStatus, NO_BROKER_DATA_MESSAGE};
use crate::db::ResultStore;
use crate::error::{AppError, Result};
use crate::provider::types::WatchlistEntry;
use crate::provider::{MarketDataGateway, WatchlistSource};
use crate::services::target_calculator::{TargetCalculator, TargetInputs};
use crate::state::AppState;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

pub const EMPTY_WATCHLIST_MESSAGE: &str = "No watchlist items to analyze";

/// Why a single symbol did not produce a success row
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("{}", NO_BROKER_DATA_MESSAGE)]
    NoBrokerData,

    #[error("{0}")]
    Upstream(String),

    #[error("Invalid market data: {0}")]
    InvalidInput(String),

    #[error("Failed to save analysis: {0}")]
    Persistence(String),

    #[error("Market data request timed out after {0}s")]
    Timeout(u64),
}

impl From<AppError> for SymbolError {
    fn from(err: AppError) -> Self {
        SymbolError::Upstream(err.to_string())
    }
}

/// Per-symbol status line of a batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub emiten: String,
    pub status: AnalysisStatus,
}

/// Per-symbol error line of a batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolErrorDetail {
    pub emiten: String,
    pub error: String,
}

/// Outcome of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub date: NaiveDate,
    pub run_id: String,
    pub analyzed: usize,
    pub errors: usize,
    pub results: Vec<SymbolResult>,
    pub error_details: Vec<SymbolErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchSummary {
    fn empty(date: NaiveDate, run_id: String) -> Self {
        Self {
            date,
            run_id,
            analyzed: 0,
            errors: 0,
            results: Vec::new(),
            error_details: Vec::new(),
            message: Some(EMPTY_WATCHLIST_MESSAGE.to_string()),
        }
    }

    pub fn total(&self) -> usize {
        self.analyzed + self.errors
    }
}

/// Batch orchestrator over the gateway, calculator and store seams
pub struct AnalysisOrchestrator {
    gateway: Arc<dyn MarketDataGateway>,
    watchlist: Arc<dyn WatchlistSource>,
    store: Arc<dyn ResultStore>,
    calculator: Arc<dyn TargetCalculator>,
    timezone: Tz,
    symbol_timeout: Duration,
    max_concurrency: usize,
}

impl AnalysisOrchestrator {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        watchlist: Arc<dyn WatchlistSource>,
        store: Arc<dyn ResultStore>,
        calculator: Arc<dyn TargetCalculator>,
    ) -> Self {
        Self {
            gateway,
            watchlist,
            store,
            calculator,
            timezone: chrono_tz::Asia::Jakarta,
            symbol_timeout: Duration::from_secs(30),
            max_concurrency: 1,
        }
    }

    /// Orchestrator wired to the application's components and settings
    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.gateway.clone(),
            state.watchlist.clone(),
            state.sqlite.clone(),
            state.calculator.clone(),
        )
        .with_timezone(state.config.timezone)
        .with_symbol_timeout(state.config.symbol_timeout)
        .with_max_concurrency(state.config.max_concurrency)
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_symbol_timeout(mut self, timeout: Duration) -> Self {
        self.symbol_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Today's date in the exchange time zone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Analyze the watchlist for today
    pub async fn run(&self, group_id: Option<i64>) -> Result<BatchSummary> {
        self.run_for_date(self.today(), group_id).await
    }

    /// Analyze the watchlist for a given date
    ///
    /// Only a watchlist fetch failure aborts the batch.
    pub async fn run_for_date(&self, date: NaiveDate, group_id: Option<i64>) -> Result<BatchSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("analysis_batch", run_id = %run_id, date = %date);

        async move {
            let items = self.watchlist.fetch_watchlist(group_id).await?;
            let entries = dedupe_entries(items.iter().map(|item| item.entry()));

            if entries.is_empty() {
                info!("{}", EMPTY_WATCHLIST_MESSAGE);
                return Ok(BatchSummary::empty(date, run_id));
            }

            info!("Analyzing {} watchlist symbols", entries.len());

            let outcomes: Vec<(String, std::result::Result<AnalysisRecord, SymbolError>)> =
                stream::iter(entries)
                    .map(|entry| async move {
                        let outcome = self.process_symbol(date, &entry.symbol).await;
                        (entry.symbol, outcome)
                    })
                    .buffered(self.max_concurrency)
                    .collect()
                    .await;

            let summary = summarize(date, run_id, outcomes);
            info!(
                "Batch complete: {} analyzed, {} errors",
                summary.analyzed, summary.errors
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Analyze one symbol, recording an error row when it fails
    pub async fn process_symbol(
        &self,
        date: NaiveDate,
        symbol: &str,
    ) -> std::result::Result<AnalysisRecord, SymbolError> {
        match self.analyze_symbol(date, symbol).await {
            Ok(record) => {
                info!("{}: success", symbol);
                Ok(record)
            }
            Err(e) => {
                warn!("{}: {}", symbol, e);
                let failure = AnalysisRecord::failure(date, symbol, &e.to_string());
                if let Err(save_err) = self.store.upsert_analysis(&failure) {
                    error!("{}: failed to record error row: {}", symbol, save_err);
                }
                Err(e)
            }
        }
    }

    async fn analyze_symbol(
        &self,
        date: NaiveDate,
        symbol: &str,
    ) -> std::result::Result<AnalysisRecord, SymbolError> {
        debug!("{}: fetching market data", symbol);

        let fetch = async {
            tokio::join!(
                self.gateway.fetch_broker_aggregate(symbol, date, date),
                self.gateway.fetch_order_book(symbol)
            )
        };
        let (broker, book) = tokio::time::timeout(self.symbol_timeout, fetch)
            .await
            .map_err(|_| SymbolError::Timeout(self.symbol_timeout.as_secs()))?;

        let broker = broker?.ok_or(SymbolError::NoBrokerData)?;
        let book = book?;

        let inputs = TargetInputs::from_market(&broker, &book);
        inputs
            .validate()
            .map_err(|e| SymbolError::InvalidInput(e.to_string()))?;

        let figures = self.calculator.compute(&inputs);
        if let Some(violation) = figures.contract_violation(book.close_price) {
            warn!("{}: target contract violated: {}", symbol, violation);
        }

        let record = AnalysisRecord::success(date, symbol, &broker, &book, &figures);
        self.store
            .upsert_analysis(&record)
            .map_err(|e| SymbolError::Persistence(e.to_string()))?;

        Ok(record)
    }
}

/// Analysis service for business logic
pub struct AnalysisService;

impl AnalysisService {
    /// Run one batch unless another is already in progress
    ///
    /// Shared by the trigger route, the scheduler and `run-once`. The
    /// summary of a completed batch is kept as the application's last run.
    pub async fn run_batch(state: &AppState, group_id: Option<i64>) -> Result<BatchSummary> {
        let _guard = state.run_lock.try_lock().map_err(|_| {
            AppError::Conflict("An analysis run is already in progress".to_string())
        })?;

        info!("AnalysisService::run_batch - group_id={:?}", group_id);

        let summary = AnalysisOrchestrator::from_state(state).run(group_id).await?;
        state.set_last_run(summary.clone());
        Ok(summary)
    }
}

/// Keep the first occurrence of every symbol, in order
fn dedupe_entries(entries: impl Iterator<Item = WatchlistEntry>) -> Vec<WatchlistEntry> {
    let mut seen = HashSet::new();
    entries
        .filter(|entry| !entry.symbol.is_empty())
        .filter(|entry| seen.insert(entry.symbol.clone()))
        .collect()
}

fn summarize(
    date: NaiveDate,
    run_id: String,
    outcomes: Vec<(String, std::result::Result<AnalysisRecord, SymbolError>)>,
) -> BatchSummary {
    let mut summary = BatchSummary {
        date,
        run_id,
        analyzed: 0,
        errors: 0,
        results: Vec::with_capacity(outcomes.len()),
        error_details: Vec::new(),
        message: None,
    };

    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(_) => {
                summary.analyzed += 1;
                summary.results.push(SymbolResult {
                    emiten: symbol,
                    status: AnalysisStatus::Success,
                });
            }
            Err(e) => {
                summary.errors += 1;
                summary.error_details.push(SymbolErrorDetail {
                    emiten: symbol,
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteDb;
    use crate::provider::types::{BrokerAggregate, OrderBookSnapshot, WatchlistGroup, WatchlistItem};
    use crate::services::target_calculator::{SmartMoneyCalculator, TargetFigures};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Market {
        Data(BrokerAggregate, OrderBookSnapshot),
        NoBroker,
        OrderBookFails,
        Hangs,
    }

    #[derive(Default)]
    struct FakeGateway {
        markets: HashMap<String, Market>,
        order_book_calls: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn with(mut self, symbol: &str, market: Market) -> Self {
            self.markets.insert(symbol.to_string(), market);
            self
        }
    }

    #[async_trait]
    impl MarketDataGateway for FakeGateway {
        async fn fetch_broker_aggregate(
            &self,
            symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Option<BrokerAggregate>> {
            match self.markets.get(symbol) {
                Some(Market::Data(broker, _)) => Ok(Some(broker.clone())),
                Some(Market::OrderBookFails) => Ok(Some(bbca_broker())),
                Some(Market::Hangs) => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(None)
                }
                _ => Ok(None),
            }
        }

        async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
            self.order_book_calls.lock().push(symbol.to_string());
            match self.markets.get(symbol) {
                Some(Market::Data(_, book)) => Ok(book.clone()),
                Some(Market::OrderBookFails) => {
                    Err(AppError::Upstream(format!("order book unavailable for {}", symbol)))
                }
                _ => Ok(bbca_book()),
            }
        }

        async fn fetch_sector(&self, _symbol: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct FakeWatchlist {
        symbols: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl WatchlistSource for FakeWatchlist {
        async fn fetch_watchlist(&self, _group_id: Option<i64>) -> Result<Vec<WatchlistItem>> {
            if self.fail {
                return Err(AppError::Upstream("watchlist unavailable".to_string()));
            }
            Ok(self
                .symbols
                .iter()
                .map(|s| WatchlistItem {
                    symbol: s.to_string(),
                    company_name: String::new(),
                    last_price: 0.0,
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

    #[derive(Default)]
    struct CountingCalculator {
        calls: AtomicUsize,
    }

    impl TargetCalculator for CountingCalculator {
        fn compute(&self, inputs: &TargetInputs) -> TargetFigures {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SmartMoneyCalculator.compute(inputs)
        }
    }

    /// Store that rejects success rows for one symbol
    struct FlakyStore {
        inner: SqliteDb,
        reject_success_for: &'static str,
    }

    impl ResultStore for FlakyStore {
        fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
            if record.symbol == self.reject_success_for && record.is_success() {
                return Err(AppError::Internal("disk full".to_string()));
            }
            self.inner.upsert_analysis(record)
        }
    }

    fn bbca_broker() -> BrokerAggregate {
        BrokerAggregate {
            top_broker_code: "BK".to_string(),
            accumulated_lots: 5000,
            average_accumulated_price: 8950.0,
        }
    }

    fn bbca_book() -> OrderBookSnapshot {
        OrderBookSnapshot::from_levels(9000.0, 9100.0, &[9025.0, 9100.0], &[8950.0, 8975.0], 500, 300)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn watchlist(symbols: Vec<&'static str>) -> Arc<FakeWatchlist> {
        Arc::new(FakeWatchlist { symbols, fail: false })
    }

    #[tokio::test]
    async fn test_bbca_success_and_xyz1_without_broker() {
        let gateway = Arc::new(
            FakeGateway::default()
                .with("BBCA", Market::Data(bbca_broker(), bbca_book()))
                .with("XYZ1", Market::NoBroker),
        );
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        let calculator = Arc::new(CountingCalculator::default());
        let orchestrator = AnalysisOrchestrator::new(
            gateway,
            watchlist(vec!["BBCA", "XYZ1"]),
            db.clone(),
            calculator.clone(),
        );

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(
            summary.results,
            vec![SymbolResult { emiten: "BBCA".to_string(), status: AnalysisStatus::Success }]
        );
        assert_eq!(summary.results.len(), summary.analyzed);
        assert_eq!(
            summary.error_details,
            vec![SymbolErrorDetail {
                emiten: "XYZ1".to_string(),
                error: NO_BROKER_DATA_MESSAGE.to_string(),
            }]
        );
        assert_eq!(calculator.calls.load(Ordering::SeqCst), 1);

        let bbca = db.get_analysis(day(), "BBCA").unwrap().unwrap();
        assert_eq!(bbca.record.status, AnalysisStatus::Success);
        assert_eq!(bbca.record.broker_code.as_deref(), Some("BK"));
        assert_eq!(bbca.record.tick_size, Some(25.0));
        assert!(bbca.record.target_max.unwrap() >= bbca.record.target_realistic.unwrap());
        assert!(bbca.record.target_realistic.unwrap() >= 9000.0);

        let xyz1 = db.get_analysis(day(), "XYZ1").unwrap().unwrap();
        assert_eq!(xyz1.record.status, AnalysisStatus::Error);
        assert_eq!(xyz1.record.error_message.as_deref(), Some(NO_BROKER_DATA_MESSAGE));
        assert_eq!(xyz1.record.target_max, None);
    }

    #[tokio::test]
    async fn test_absent_broker_never_invokes_calculator() {
        let gateway = Arc::new(FakeGateway::default().with("XYZ1", Market::NoBroker));
        let calculator = Arc::new(CountingCalculator::default());
        let orchestrator = AnalysisOrchestrator::new(
            gateway,
            watchlist(vec!["XYZ1"]),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            calculator.clone(),
        );

        let result = orchestrator.process_symbol(day(), "XYZ1").await;

        assert!(matches!(result, Err(SymbolError::NoBrokerData)));
        assert_eq!(calculator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_symbols() {
        let gateway = Arc::new(
            FakeGateway::default()
                .with("AAAA", Market::Data(bbca_broker(), bbca_book()))
                .with("BBBB", Market::OrderBookFails)
                .with("CCCC", Market::Data(bbca_broker(), bbca_book()))
                .with("DDDD", Market::Data(bbca_broker(), bbca_book())),
        );
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        let orchestrator = AnalysisOrchestrator::new(
            gateway.clone(),
            watchlist(vec!["AAAA", "BBBB", "CCCC", "DDDD"]),
            db.clone(),
            Arc::new(SmartMoneyCalculator),
        );

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        assert_eq!(summary.analyzed, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.error_details[0].emiten, "BBBB");
        assert!(summary.error_details[0].error.contains("order book unavailable"));
        assert_eq!(
            *gateway.order_book_calls.lock(),
            vec!["AAAA", "BBBB", "CCCC", "DDDD"]
        );
        assert!(db.get_analysis(day(), "DDDD").unwrap().unwrap().record.is_success());
        assert!(!db.get_analysis(day(), "BBBB").unwrap().unwrap().record.is_success());
    }

    #[tokio::test]
    async fn test_primary_write_failure_surfaces_in_error_list() {
        let gateway = Arc::new(
            FakeGateway::default()
                .with("BBCA", Market::Data(bbca_broker(), bbca_book()))
                .with("TLKM", Market::Data(bbca_broker(), bbca_book())),
        );
        let store = Arc::new(FlakyStore {
            inner: SqliteDb::open_in_memory().unwrap(),
            reject_success_for: "BBCA",
        });
        let orchestrator = AnalysisOrchestrator::new(
            gateway,
            watchlist(vec!["BBCA", "TLKM"]),
            store.clone(),
            Arc::new(SmartMoneyCalculator),
        );

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.errors, 1);
        assert!(summary.error_details[0].error.starts_with("Failed to save analysis"));

        let bbca = store.inner.get_analysis(day(), "BBCA").unwrap().unwrap();
        assert_eq!(bbca.record.status, AnalysisStatus::Error);
    }

    #[tokio::test]
    async fn test_slow_symbol_times_out() {
        let gateway = Arc::new(
            FakeGateway::default()
                .with("SLOW", Market::Hangs)
                .with("BBCA", Market::Data(bbca_broker(), bbca_book())),
        );
        let orchestrator = AnalysisOrchestrator::new(
            gateway,
            watchlist(vec!["SLOW", "BBCA"]),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            Arc::new(SmartMoneyCalculator),
        )
        .with_symbol_timeout(Duration::from_millis(50));

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.errors, 1);
        assert!(summary.error_details[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_duplicates_processed_once_and_order_kept_with_concurrency() {
        let gateway = Arc::new(
            FakeGateway::default()
                .with("BBCA", Market::Data(bbca_broker(), bbca_book()))
                .with("TLKM", Market::Data(bbca_broker(), bbca_book()))
                .with("ASII", Market::Data(bbca_broker(), bbca_book()))
                .with("GOTO", Market::NoBroker),
        );
        let orchestrator = AnalysisOrchestrator::new(
            gateway,
            watchlist(vec!["bbca", "TLKM", "GOTO", "BBCA", "ASII"]),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            Arc::new(SmartMoneyCalculator),
        )
        .with_max_concurrency(3);

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        let order: Vec<&str> = summary.results.iter().map(|r| r.emiten.as_str()).collect();
        assert_eq!(order, vec!["BBCA", "TLKM", "ASII"]);
        assert_eq!(summary.error_details[0].emiten, "GOTO");
        assert_eq!(summary.total(), 4);
    }

    #[tokio::test]
    async fn test_empty_watchlist_reports_message() {
        let orchestrator = AnalysisOrchestrator::new(
            Arc::new(FakeGateway::default()),
            watchlist(vec![]),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            Arc::new(SmartMoneyCalculator),
        );

        let summary = orchestrator.run_for_date(day(), None).await.unwrap();

        assert_eq!(summary.total(), 0);
        assert_eq!(summary.message.as_deref(), Some(EMPTY_WATCHLIST_MESSAGE));
    }

    #[tokio::test]
    async fn test_watchlist_failure_aborts_batch() {
        let orchestrator = AnalysisOrchestrator::new(
            Arc::new(FakeGateway::default()),
            Arc::new(FakeWatchlist { symbols: vec![], fail: true }),
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            Arc::new(SmartMoneyCalculator),
        );

        let err = orchestrator.run_for_date(day(), None).await.unwrap_err();
        assert!(err.to_string().contains("watchlist unavailable"));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = summarize(
            day(),
            "run-1".to_string(),
            vec![("XYZ1".to_string(), Err(SymbolError::NoBrokerData))],
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["date"], "2024-06-03");
        assert_eq!(json["errorDetails"][0]["emiten"], "XYZ1");
        assert_eq!(json["results"], serde_json::json!([]));
        assert_eq!(json["errors"], 1);
        assert!(json.get("message").is_none());
    }
}
