//! Database housekeeping commands.
//!
//! # Responsibility
//! - Run SQLite integrity checks and space reclamation.
//! - Report per-table row counts for the superadmin maintenance view.
//!
//! # Invariants
//! - Only a fixed allow-list of statements is executed; no caller-provided SQL.

use super::DbResult;
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

/// Application tables reported by [`table_stats`], in schema order.
pub const APPLICATION_TABLES: &[&str] = &[
    "departments",
    "users",
    "suppliers",
    "items",
    "item_prices",
    "statuses",
    "purchase_orders",
    "po_items",
    "approvals",
    "settings",
];

/// Row count for one application table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStat {
    pub table: &'static str,
    pub rows: i64,
}

/// Outcome of `PRAGMA integrity_check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// `true` when SQLite reported exactly `ok`.
    pub ok: bool,
    /// Raw problem lines reported by SQLite. Empty when `ok`.
    pub problems: Vec<String>,
}

/// Runs `PRAGMA integrity_check` and `PRAGMA foreign_key_check`.
pub fn integrity_check(conn: &Connection) -> DbResult<IntegrityReport> {
    let mut problems = Vec::new();

    let mut stmt = conn.prepare("PRAGMA integrity_check;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let line: String = row.get(0)?;
        if line != "ok" {
            problems.push(line);
        }
    }

    let mut stmt = conn.prepare("PRAGMA foreign_key_check;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let table: String = row.get(0)?;
        let rowid: Option<i64> = row.get(1)?;
        let parent: String = row.get(2)?;
        problems.push(format!(
            "foreign key violation in `{table}` rowid={} parent=`{parent}`",
            rowid.map_or_else(|| "null".to_string(), |value| value.to_string())
        ));
    }

    info!(
        "event=db_integrity_check module=db status=ok problems={}",
        problems.len()
    );
    Ok(IntegrityReport {
        ok: problems.is_empty(),
        problems,
    })
}

/// Rebuilds the database file to reclaim free pages.
pub fn vacuum(conn: &Connection) -> DbResult<()> {
    let started_at = Instant::now();
    conn.execute_batch("VACUUM;")?;
    info!(
        "event=db_vacuum module=db status=ok duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Refreshes query planner statistics.
pub fn analyze(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("ANALYZE;")?;
    info!("event=db_analyze module=db status=ok");
    Ok(())
}

/// Returns row counts for every application table.
pub fn table_stats(conn: &Connection) -> DbResult<Vec<TableStat>> {
    let mut stats = Vec::with_capacity(APPLICATION_TABLES.len());
    for table in APPLICATION_TABLES {
        // Table names come from the static allow-list above.
        let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })?;
        stats.push(TableStat { table, rows });
    }
    Ok(stats)
}
