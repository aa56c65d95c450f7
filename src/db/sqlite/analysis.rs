//! Watchlist analysis rows (`stock_queries`)
//!
//! Rows are keyed by (from_date, emiten). Writes are upserts so a rerun on
//! the same day replaces the earlier outcome in place.

use crate::db::sqlite::models::{AnalysisRecord, AnalysisRow, AnalysisStatus, HistoryFilter};
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, ToSql};

const SELECT_COLUMNS: &str = "id, from_date, to_date, emiten, bandar, barang_bandar, rata_rata_bandar,
    harga, ara, arb, fraksi, total_bid, total_offer, total_papan, rata_rata_bid_ofer,
    a, p, target_realistis, target_max, status, error_message, created_at, updated_at";

/// Insert or overwrite the row for (record.date, record.symbol)
pub fn upsert_analysis(conn: &Connection, record: &AnalysisRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO stock_queries (
            from_date, to_date, emiten, bandar, barang_bandar, rata_rata_bandar,
            harga, ara, arb, fraksi, total_bid, total_offer, total_papan,
            rata_rata_bid_ofer, a, p, target_realistis, target_max, status, error_message
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
        ON CONFLICT(from_date, emiten) DO UPDATE SET
            to_date = excluded.to_date,
            bandar = excluded.bandar,
            barang_bandar = excluded.barang_bandar,
            rata_rata_bandar = excluded.rata_rata_bandar,
            harga = excluded.harga,
            ara = excluded.ara,
            arb = excluded.arb,
            fraksi = excluded.fraksi,
            total_bid = excluded.total_bid,
            total_offer = excluded.total_offer,
            total_papan = excluded.total_papan,
            rata_rata_bid_ofer = excluded.rata_rata_bid_ofer,
            a = excluded.a,
            p = excluded.p,
            target_realistis = excluded.target_realistis,
            target_max = excluded.target_max,
            status = excluded.status,
            error_message = excluded.error_message,
            updated_at = datetime('now')
        "#,
        params![
            record.date,
            record.to_date,
            record.symbol,
            record.broker_code,
            record.accumulated_lots,
            record.average_accumulated_price,
            record.close_price,
            record.best_offer_price,
            record.best_bid_price,
            record.tick_size,
            record.total_bid_lots,
            record.total_offer_lots,
            record.board_count,
            record.average_bid_offer,
            record.anchor_a,
            record.anchor_p,
            record.target_realistic,
            record.target_max,
            record.status.as_str(),
            record.error_message,
        ],
    )?;

    Ok(())
}

/// Fetch the row for one (date, symbol) key
pub fn get_analysis(conn: &Connection, date: NaiveDate, symbol: &str) -> Result<Option<AnalysisRow>> {
    let sql = format!(
        "SELECT {} FROM stock_queries WHERE from_date = ?1 AND emiten = ?2",
        SELECT_COLUMNS
    );

    match conn.query_row(&sql, params![date, symbol], map_row) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Filtered, paginated history ordered by date desc, symbol asc
///
/// Returns the page and the total number of matching rows.
pub fn query_history(conn: &Connection, filter: &HistoryFilter) -> Result<(Vec<AnalysisRow>, i64)> {
    let mut clauses = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref symbol) = filter.symbol {
        clauses.push("emiten = ?");
        params_vec.push(Box::new(symbol.clone()));
    }
    if let Some(from) = filter.from_date {
        clauses.push("from_date >= ?");
        params_vec.push(Box::new(from));
    }
    if let Some(to) = filter.to_date {
        clauses.push("from_date <= ?");
        params_vec.push(Box::new(to));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        params_vec.push(Box::new(status.as_str()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM stock_queries{}", where_sql),
        params_refs.as_slice(),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM stock_queries{} ORDER BY from_date DESC, emiten ASC LIMIT {} OFFSET {}",
        SELECT_COLUMNS,
        where_sql,
        filter.limit.max(0),
        filter.offset.max(0)
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_refs.as_slice(), map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, count))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRow> {
    let status: String = row.get(19)?;
    let status = AnalysisStatus::parse(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(AnalysisRow {
        id: row.get(0)?,
        record: AnalysisRecord {
            date: row.get(1)?,
            to_date: row.get(2)?,
            symbol: row.get(3)?,
            broker_code: row.get(4)?,
            accumulated_lots: row.get(5)?,
            average_accumulated_price: row.get(6)?,
            close_price: row.get(7)?,
            best_offer_price: row.get(8)?,
            best_bid_price: row.get(9)?,
            tick_size: row.get(10)?,
            total_bid_lots: row.get(11)?,
            total_offer_lots: row.get(12)?,
            board_count: row.get(13)?,
            average_bid_offer: row.get(14)?,
            anchor_a: row.get(15)?,
            anchor_p: row.get(16)?,
            target_realistic: row.get(17)?,
            target_max: row.get(18)?,
            status,
            error_message: row.get(20)?,
        },
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}
