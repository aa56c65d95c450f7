//! Services Layer
//!
//! Business logic shared between the REST API, the daily scheduler and the
//! CLI. Services hold the core logic; routes and commands only translate
//! inputs and outputs.
//!
//! # Services
//!
//! - `AnalysisService` - Batch watchlist analysis (`AnalysisOrchestrator`)
//! - `HistoryService` - Stored analysis rows
//! - `WatchlistService` - Watchlist listing and groups
//! - `FlagService` - Symbol flags and flag events
//!
//! `target_calculator` holds the pure target formula.

pub mod target_calculator;
pub mod analysis_service;
pub mod history_service;
pub mod watchlist_service;
pub mod flag_service;

// Re-export commonly used types and services
pub use analysis_service::{AnalysisOrchestrator, AnalysisService, BatchSummary, SymbolError};
pub use history_service::{HistoryParams, HistoryResult, HistoryService};
pub use watchlist_service::{WatchlistService, WatchlistView};
pub use flag_service::FlagService;
pub use target_calculator::{SmartMoneyCalculator, TargetCalculator, TargetFigures, TargetInputs};
