use flashback_common::{Error, Result};
use rusqlite::{Connection, Transaction, params};
use tracing::{info, warn};

use super::{Migration, exec};
use crate::slug::slugify;

pub(super) const MIGRATION: Migration = Migration {
    version: "004_create_tags",
    description: "Create tags and snapshot_tags junction table for many-to-many relationship",
    up,
    down: Some(down),
};

const CREATE_TAG_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        color TEXT DEFAULT NULL CHECK (color IS NULL OR length(color) <= 7),
        description TEXT DEFAULT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_tags_slug ON tags (slug);
    CREATE INDEX IF NOT EXISTS idx_tags_name ON tags (name);

    CREATE TABLE IF NOT EXISTS snapshot_tags (
        snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (snapshot_id, tag_id)
    );

    CREATE INDEX IF NOT EXISTS idx_snapshot_tags_snapshot_id ON snapshot_tags (snapshot_id);
    CREATE INDEX IF NOT EXISTS idx_snapshot_tags_tag_id ON snapshot_tags (tag_id);

    CREATE TRIGGER IF NOT EXISTS update_tags_updated_at
        AFTER UPDATE ON tags
        FOR EACH ROW
        WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE tags
           SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = NEW.id;
    END;
";

/// Creates the tag tables and moves the legacy `snapshots.tags` JSON arrays
/// into them, all in one transaction. The legacy column is left in place.
fn up(conn: &Connection) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

    exec(&tx, CREATE_TAG_TABLES)?;
    let linked = backfill_legacy_tags(&tx)?;

    tx.commit()
        .map_err(|e| Error::Database(format!("failed to commit tag migration: {e}")))?;
    info!("linked {linked} legacy snapshot tags");
    Ok(())
}

fn down(conn: &Connection) -> Result<()> {
    exec(
        conn,
        "DROP TRIGGER IF EXISTS update_tags_updated_at;
         DROP TABLE IF EXISTS snapshot_tags;
         DROP TABLE IF EXISTS tags;",
    )
}

fn backfill_legacy_tags(tx: &Transaction<'_>) -> Result<usize> {
    let legacy: Vec<(i64, String)> = {
        let mut stmt = tx
            .prepare("SELECT id, tags FROM snapshots WHERE tags IS NOT NULL AND tags != '[]'")
            .map_err(|e| Error::Database(format!("failed to prepare legacy tag query: {e}")))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| Error::Database(format!("failed to query legacy tags: {e}")))?;
        rows.collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Database(format!("failed to read legacy tag row: {e}")))?
    };

    let mut insert_tag = tx
        .prepare("INSERT OR IGNORE INTO tags (name, slug) VALUES (?1, ?2)")
        .map_err(|e| Error::Database(format!("failed to prepare tag insert: {e}")))?;
    let mut link = tx
        .prepare(
            "INSERT OR IGNORE INTO snapshot_tags (snapshot_id, tag_id)
             SELECT ?1, id FROM tags WHERE slug = ?2",
        )
        .map_err(|e| Error::Database(format!("failed to prepare tag link: {e}")))?;

    let mut linked = 0;
    for (snapshot_id, raw) in legacy {
        let names: Vec<String> = match serde_json::from_str(&raw) {
            Ok(names) => names,
            Err(e) => {
                warn!("snapshot {snapshot_id} has unreadable legacy tags, skipping: {e}");
                continue;
            }
        };
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            // Names that collide on slug share the tag stored first.
            let slug = slugify(name);
            insert_tag
                .execute(params![name, slug])
                .map_err(|e| Error::Database(format!("failed to insert tag {name}: {e}")))?;
            linked += link
                .execute(params![snapshot_id, slug])
                .map_err(|e| Error::Database(format!("failed to link tag {name}: {e}")))?;
        }
    }
    Ok(linked)
}
