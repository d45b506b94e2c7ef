use chrono::{DateTime, Utc};
use flashback_common::{Error, Result};
use rusqlite::{Connection, params};

use crate::timestamp::parse_datetime;

pub const LEDGER_TABLE: &str = "schema_migrations";

/// One row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: String,
    pub applied_at: DateTime<Utc>,
}

/// Read/write access to the `schema_migrations` table.
pub struct Ledger<'c> {
    conn: &'c Connection,
}

impl<'c> Ledger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the ledger table if it is missing. Safe to call on every run.
    pub fn ensure(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    version TEXT NOT NULL UNIQUE,
                    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );",
            )
            .map_err(|e| Error::Database(format!("failed to create migration ledger: {e}")))
    }

    pub fn is_applied(&self, version: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to check migration {version}: {e}")))
    }

    /// Insert-if-absent. Returns `false` when the version was already recorded.
    pub fn record_applied(&self, version: &str) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Database(format!("failed to record migration {version}: {e}")))?;
        Ok(inserted > 0)
    }

    /// Delete by version. Returns `false` when there was nothing to delete.
    pub fn remove_applied(&self, version: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM schema_migrations WHERE version = ?1",
                params![version],
            )
            .map_err(|e| Error::Database(format!("failed to remove migration {version}: {e}")))?;
        Ok(removed > 0)
    }

    /// All recorded versions, oldest-applied first.
    pub fn list_applied(&self) -> Result<Vec<AppliedMigration>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT version, applied_at FROM schema_migrations
                 ORDER BY applied_at ASC, id ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare ledger query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AppliedMigration {
                    version: row.get(0)?,
                    applied_at: parse_datetime(&row.get::<_, String>(1)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))
    }
}
