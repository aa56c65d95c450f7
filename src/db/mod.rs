//! Database module
//!
//! SQLite holds analysis results, symbol flags and session values.

pub mod sqlite;

use crate::error::Result;
use sqlite::models::AnalysisRecord;

/// Idempotent row store keyed by (date, symbol)
///
/// Writing the same key twice leaves exactly one row holding the second write.
pub trait ResultStore: Send + Sync {
    fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()>;
}
