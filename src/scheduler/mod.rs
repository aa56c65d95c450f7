//! Scheduler module
//!
//! - Daily watchlist analysis after the market close
//! - Remote trigger for running servers (cron equivalent)

mod daily_analysis;
pub mod trigger;

pub use daily_analysis::DailyAnalysisScheduler;
pub use trigger::trigger_remote;
