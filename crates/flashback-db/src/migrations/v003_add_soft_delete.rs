use flashback_common::Result;
use rusqlite::Connection;

use super::{Migration, column_exists, exec};

pub(super) const MIGRATION: Migration = Migration {
    version: "003_add_soft_delete",
    description: "Add soft delete capability with deleted_at column",
    up,
    down: Some(down),
};

// SQLite has no ADD/DROP COLUMN IF [NOT] EXISTS, so the column is guarded by
// hand to keep both directions re-runnable.
fn up(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "snapshots", "deleted_at")? {
        exec(
            conn,
            "ALTER TABLE snapshots ADD COLUMN deleted_at TEXT DEFAULT NULL",
        )?;
    }
    exec(
        conn,
        "CREATE INDEX IF NOT EXISTS idx_snapshots_deleted_at
            ON snapshots (deleted_at)
            WHERE deleted_at IS NULL",
    )
}

fn down(conn: &Connection) -> Result<()> {
    exec(conn, "DROP INDEX IF EXISTS idx_snapshots_deleted_at")?;
    if column_exists(conn, "snapshots", "deleted_at")? {
        exec(conn, "ALTER TABLE snapshots DROP COLUMN deleted_at")?;
    }
    Ok(())
}
