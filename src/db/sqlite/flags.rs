//! Symbol flag operations

use crate::db::sqlite::models::{FlagValue, SymbolFlag};
use crate::error::Result;
use rusqlite::{params, Connection, ToSql};
use std::collections::HashMap;

/// Set or replace the flag for a symbol
pub fn upsert_flag(conn: &Connection, symbol: &str, flag: FlagValue) -> Result<SymbolFlag> {
    conn.execute(
        "INSERT INTO emiten_flags (emiten, flag, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(emiten) DO UPDATE SET
            flag = excluded.flag,
            updated_at = excluded.updated_at",
        params![symbol, flag.as_str()],
    )?;

    let updated_at: String = conn.query_row(
        "SELECT updated_at FROM emiten_flags WHERE emiten = ?1",
        [symbol],
        |row| row.get(0),
    )?;

    Ok(SymbolFlag {
        symbol: symbol.to_string(),
        flag,
        updated_at,
    })
}

pub fn get_flag(conn: &Connection, symbol: &str) -> Result<Option<SymbolFlag>> {
    let result = conn.query_row(
        "SELECT emiten, flag, updated_at FROM emiten_flags WHERE emiten = ?1",
        [symbol],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((symbol, flag, updated_at)) => Ok(Some(SymbolFlag {
            symbol,
            flag: FlagValue::parse(&flag)?,
            updated_at,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Flags for a set of symbols; symbols without a flag are absent from the map
pub fn get_flags(conn: &Connection, symbols: &[String]) -> Result<HashMap<String, FlagValue>> {
    let mut flags = HashMap::new();
    if symbols.is_empty() {
        return Ok(flags);
    }

    let placeholders = vec!["?"; symbols.len()].join(", ");
    let sql = format!(
        "SELECT emiten, flag FROM emiten_flags WHERE emiten IN ({})",
        placeholders
    );
    let params_refs: Vec<&dyn ToSql> = symbols.iter().map(|s| s as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    for row in rows {
        let (symbol, flag) = row?;
        flags.insert(symbol, FlagValue::parse(&flag)?);
    }

    Ok(flags)
}
