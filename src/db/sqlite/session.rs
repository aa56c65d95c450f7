//! Key/value session storage (provider token and similar)

use crate::error::Result;
use rusqlite::{params, Connection};

pub fn get_session_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM session WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_session(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO session (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;

    #[test]
    fn test_session_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_session_value(&conn, "stockbit_token").unwrap(), None);

        upsert_session(&conn, "stockbit_token", "first").unwrap();
        upsert_session(&conn, "stockbit_token", "second").unwrap();

        assert_eq!(
            get_session_value(&conn, "stockbit_token").unwrap().as_deref(),
            Some("second")
        );
    }
}
