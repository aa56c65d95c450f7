//! SQLite database module

pub mod models;
mod migrations;
mod analysis;
mod flags;
mod session;

use crate::db::ResultStore;
use crate::error::Result;
use chrono::NaiveDate;
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

/// Session key under which the provider token is kept
pub const PROVIDER_TOKEN_KEY: &str = "stockbit_token";

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    ///
    /// The path `:memory:` opens a private in-memory database.
    pub fn new(path: &Path) -> Result<Self> {
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Analysis Methods ==========

    /// Insert or overwrite the analysis row for (date, symbol)
    pub fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let conn = self.conn.lock();
        analysis::upsert_analysis(&conn, record)
    }

    pub fn get_analysis(&self, date: NaiveDate, symbol: &str) -> Result<Option<AnalysisRow>> {
        let conn = self.conn.lock();
        analysis::get_analysis(&conn, date, symbol)
    }

    /// Filtered history page plus the total match count
    pub fn query_history(&self, filter: &HistoryFilter) -> Result<(Vec<AnalysisRow>, i64)> {
        let conn = self.conn.lock();
        analysis::query_history(&conn, filter)
    }

    // ========== Flag Methods ==========

    pub fn upsert_flag(&self, symbol: &str, flag: FlagValue) -> Result<SymbolFlag> {
        let conn = self.conn.lock();
        flags::upsert_flag(&conn, symbol, flag)
    }

    pub fn get_flag(&self, symbol: &str) -> Result<Option<SymbolFlag>> {
        let conn = self.conn.lock();
        flags::get_flag(&conn, symbol)
    }

    pub fn get_flags(&self, symbols: &[String]) -> Result<HashMap<String, FlagValue>> {
        let conn = self.conn.lock();
        flags::get_flags(&conn, symbols)
    }

    // ========== Session Methods ==========

    pub fn get_session_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        session::get_session_value(&conn, key)
    }

    pub fn upsert_session(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        session::upsert_session(&conn, key, value)
    }
}

impl ResultStore for SqliteDb {
    fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        SqliteDb::upsert_analysis(self, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_database_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("analyzer.db");
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

        {
            let db = SqliteDb::new(&path).unwrap();
            db.upsert_analysis(&AnalysisRecord::failure(date, "XYZ1", NO_BROKER_DATA_MESSAGE))
                .unwrap();
            db.upsert_session(PROVIDER_TOKEN_KEY, "token-1").unwrap();
        }

        let db = SqliteDb::new(&path).unwrap();
        let row = db.get_analysis(date, "XYZ1").unwrap().unwrap();
        assert_eq!(row.record.status, AnalysisStatus::Error);
        assert_eq!(
            db.get_session_value(PROVIDER_TOKEN_KEY).unwrap().as_deref(),
            Some("token-1")
        );
    }

    #[test]
    fn test_memory_path_opens_in_memory() {
        let db = SqliteDb::new(Path::new(":memory:")).unwrap();
        assert!(db.get_flag("BBCA").unwrap().is_none());
    }
}
