use flashback_common::Result;
use rusqlite::Connection;

use super::{Migration, exec};

pub(super) const MIGRATION: Migration = Migration {
    version: "001_create_snapshots",
    description: "Create the snapshots table with indexes and triggers",
    up,
    down: Some(down),
};

fn up(conn: &Connection) -> Result<()> {
    exec(
        conn,
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            anchor_date TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            tags TEXT NOT NULL DEFAULT '[]' CHECK (json_valid(tags)),
            metadata TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(metadata))
        );

        -- Timeline queries walk anchor_date newest first.
        CREATE INDEX IF NOT EXISTS idx_snapshots_anchor_date
            ON snapshots (anchor_date DESC);

        CREATE INDEX IF NOT EXISTS idx_snapshots_created_at
            ON snapshots (created_at DESC);

        -- The WHEN guard stops the trigger from re-firing on its own update
        -- and lets callers set updated_at explicitly.
        CREATE TRIGGER IF NOT EXISTS update_snapshots_updated_at
            AFTER UPDATE ON snapshots
            FOR EACH ROW
            WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE snapshots
               SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = NEW.id;
        END;",
    )
}

fn down(conn: &Connection) -> Result<()> {
    exec(
        conn,
        "DROP TRIGGER IF EXISTS update_snapshots_updated_at;
         DROP TABLE IF EXISTS snapshots;",
    )
}
