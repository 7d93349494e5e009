//! Key/value settings repository.
//!
//! Values are stored as text; typed parsing and range checks belong to
//! `service::settings_service`. A batch of rows is written in one IMMEDIATE
//! transaction, so readers never see half of an update.

use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;

/// Repository interface for raw settings rows.
pub trait SettingsRepository {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;
    /// Inserts or replaces every `(key, value)` row, all or nothing.
    fn put_settings(&self, rows: &[(&str, String)]) -> RepoResult<()>;
    fn all_settings(&self) -> RepoResult<BTreeMap<String, String>>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["settings"])?;
        Ok(Self { conn })
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_settings(&self, rows: &[(&str, String)]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = (strftime('%s', 'now') * 1000);",
            )?;
            for (key, value) in rows {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn all_settings(&self) -> RepoResult<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings;")?;
        let mut rows = stmt.query([])?;
        let mut settings = BTreeMap::new();
        while let Some(row) = rows.next()? {
            settings.insert(row.get(0)?, row.get(1)?);
        }
        Ok(settings)
    }
}
