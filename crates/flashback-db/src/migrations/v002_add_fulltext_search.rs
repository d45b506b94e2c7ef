use flashback_common::Result;
use rusqlite::Connection;

use super::{Migration, exec};

pub(super) const MIGRATION: Migration = Migration {
    version: "002_add_fulltext_search",
    description: "Add full-text search over snapshot content",
    up,
    down: Some(down),
};

fn up(conn: &Connection) -> Result<()> {
    exec(
        conn,
        "CREATE VIRTUAL TABLE IF NOT EXISTS snapshots_fts USING fts5(
            content,
            content = 'snapshots',
            content_rowid = 'id',
            tokenize = 'porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS snapshots_fts_insert
            AFTER INSERT ON snapshots
        BEGIN
            INSERT INTO snapshots_fts (rowid, content) VALUES (NEW.id, NEW.content);
        END;

        CREATE TRIGGER IF NOT EXISTS snapshots_fts_delete
            AFTER DELETE ON snapshots
        BEGIN
            INSERT INTO snapshots_fts (snapshots_fts, rowid, content)
            VALUES ('delete', OLD.id, OLD.content);
        END;

        CREATE TRIGGER IF NOT EXISTS snapshots_fts_update
            AFTER UPDATE OF content ON snapshots
        BEGIN
            INSERT INTO snapshots_fts (snapshots_fts, rowid, content)
            VALUES ('delete', OLD.id, OLD.content);
            INSERT INTO snapshots_fts (rowid, content) VALUES (NEW.id, NEW.content);
        END;

        -- Index rows written before this migration. Rebuilding is idempotent.
        INSERT INTO snapshots_fts (snapshots_fts) VALUES ('rebuild');",
    )
}

fn down(conn: &Connection) -> Result<()> {
    exec(
        conn,
        "DROP TRIGGER IF EXISTS snapshots_fts_update;
         DROP TRIGGER IF EXISTS snapshots_fts_delete;
         DROP TRIGGER IF EXISTS snapshots_fts_insert;
         DROP TABLE IF EXISTS snapshots_fts;",
    )
}
