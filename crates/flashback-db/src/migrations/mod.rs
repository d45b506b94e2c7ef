//! Migration system for tracking and applying database schema changes.
//!
//! Each migration is a versioned unit with a forward action and an optional
//! reverse action. Units are applied in registry order and tracked in the
//! `schema_migrations` ledger table; a ledger row is the only evidence the
//! engine trusts that a unit has run.
//!
//! The registry is append-only. Once a unit has shipped, never reorder, edit,
//! or remove it, and never change its version string.

mod ledger;
mod runner;
mod v001_create_snapshots;
mod v002_add_fulltext_search;
mod v003_add_soft_delete;
mod v004_create_tags;

use flashback_common::{Error, Result};
use rusqlite::Connection;

pub use ledger::{AppliedMigration, LEDGER_TABLE, Ledger};
pub use runner::{
    MigrationReport, MigrationState, MigrationStatus, Migrator, RollbackReport, SkipReason,
    SkippedMigration,
};

/// A forward or reverse action. Runs directly against the borrowed handle;
/// no transaction is opened around it by the runner.
pub type MigrationFn = fn(&Connection) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: &'static str,
    pub description: &'static str,
    pub up: MigrationFn,
    /// `None` marks a one-way unit that rollback skips.
    pub down: Option<MigrationFn>,
}

impl Migration {
    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

static MIGRATIONS: &[Migration] = &[
    v001_create_snapshots::MIGRATION,
    v002_add_fulltext_search::MIGRATION,
    v003_add_soft_delete::MIGRATION,
    v004_create_tags::MIGRATION,
];

/// Every built-in migration in application order.
pub fn registry() -> &'static [Migration] {
    MIGRATIONS
}

pub(crate) fn exec(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute_batch(sql)
        .map_err(|e| Error::Database(e.to_string()))
}

pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to inspect {table}.{column}: {e}")))
}

#[cfg(test)]
pub(crate) fn object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = ?1 AND name = ?2",
        rusqlite::params![kind, name],
        |row| row.get(0),
    )
    .unwrap()
}
