//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_stock_queries", CREATE_STOCK_QUERIES_TABLE)?;
    run_migration(conn, "002_emiten_flags", CREATE_EMITEN_FLAGS_TABLE)?;
    run_migration(conn, "003_session", CREATE_SESSION_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_STOCK_QUERIES_TABLE: &str = r#"
CREATE TABLE stock_queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_date TEXT NOT NULL,
    to_date TEXT NOT NULL,
    emiten TEXT NOT NULL,
    bandar TEXT,
    barang_bandar INTEGER,
    rata_rata_bandar REAL,
    harga REAL,
    ara REAL,
    arb REAL,
    fraksi REAL,
    total_bid INTEGER,
    total_offer INTEGER,
    total_papan REAL,
    rata_rata_bid_ofer REAL,
    a REAL,
    p REAL,
    target_realistis REAL,
    target_max REAL,
    status TEXT NOT NULL DEFAULT 'success' CHECK (status IN ('success', 'error')),
    error_message TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(from_date, emiten)
);
CREATE INDEX IF NOT EXISTS idx_stock_queries_emiten ON stock_queries(emiten);
CREATE INDEX IF NOT EXISTS idx_stock_queries_status ON stock_queries(status);
"#;

const CREATE_EMITEN_FLAGS_TABLE: &str = r#"
CREATE TABLE emiten_flags (
    emiten TEXT PRIMARY KEY,
    flag TEXT NOT NULL CHECK (flag IN ('OK', 'NG', 'Neutral')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_SESSION_TABLE: &str = r#"
CREATE TABLE session (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
