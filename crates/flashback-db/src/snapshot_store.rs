use std::collections::HashMap;

use chrono::Utc;
use flashback_common::{Error, NewSnapshot, Result, Snapshot, SortOrder};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use crate::search::{SearchQuery, SearchResults, placeholders, where_clause};
use crate::slug::slugify;
use crate::timestamp::{format_timestamp, parse_datetime};

const SNAPSHOT_COLUMNS: &str =
    "s.id, s.content, s.anchor_date, s.created_at, s.updated_at, s.deleted_at, s.metadata";

/// Snapshot reads and writes over a migrated connection.
pub struct SnapshotStore<'c> {
    conn: &'c Connection,
}

impl<'c> SnapshotStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a snapshot and link its tags in one transaction.
    ///
    /// The returned tags keep the caller's order, trimmed and de-duplicated.
    pub fn create(&self, input: &NewSnapshot) -> Result<Snapshot> {
        if input.content.trim().is_empty() {
            return Err(Error::Validation("content is required".into()));
        }
        if !input.metadata.is_object() {
            return Err(Error::Validation("metadata must be a JSON object".into()));
        }
        let metadata = serde_json::to_string(&input.metadata)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        let id: i64 = tx
            .query_row(
                "INSERT INTO snapshots (content, anchor_date, metadata)
                 VALUES (?1, ?2, ?3)
                 RETURNING id",
                params![input.content, format_timestamp(&input.anchor_date), metadata],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to create snapshot: {e}")))?;

        let mut tags = Vec::new();
        for name in input.normalized_tags() {
            let (tag_id, stored): (i64, String) = tx
                .query_row(
                    "INSERT INTO tags (name, slug) VALUES (?1, ?2)
                     ON CONFLICT (name) DO UPDATE SET name = excluded.name
                     RETURNING id, name",
                    params![name, slugify(&name)],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| Error::Database(format!("failed to upsert tag {name}: {e}")))?;

            tx.execute(
                "INSERT OR IGNORE INTO snapshot_tags (snapshot_id, tag_id) VALUES (?1, ?2)",
                params![id, tag_id],
            )
            .map_err(|e| Error::Database(format!("failed to tag snapshot: {e}")))?;
            tags.push(stored);
        }

        let mut snapshot = fetch_one(&tx, id)?
            .ok_or_else(|| Error::Database(format!("snapshot {id} vanished after insert")))?;
        snapshot.tags = tags;

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit snapshot: {e}")))?;
        info!("created snapshot {id} with {} tag(s)", snapshot.tags.len());
        Ok(snapshot)
    }

    /// Fetch one snapshot, soft-deleted or not. Tags are sorted by name.
    pub fn get(&self, id: i64) -> Result<Option<Snapshot>> {
        let Some(mut snapshot) = fetch_one(self.conn, id)? else {
            return Ok(None);
        };
        snapshot.tags = self.tags_for(&[id])?.remove(&id).unwrap_or_default();
        Ok(Some(snapshot))
    }

    /// Mark a live snapshot deleted. Returns `false` if it does not exist or
    /// is already deleted.
    pub fn soft_delete(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE snapshots SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![format_timestamp(&Utc::now()), id],
            )
            .map_err(|e| Error::Database(format!("failed to delete snapshot {id}: {e}")))?;
        Ok(changed > 0)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let limit = query.effective_limit();
        let clause = where_clause(&query.predicates());
        debug!("searching snapshots: {}", clause.sql);

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM snapshots s {}", clause.sql),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count snapshots: {e}")))?;

        let direction = match query.sort {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots s {}
             ORDER BY s.anchor_date {direction}, s.id {direction}
             LIMIT ? OFFSET ?",
            clause.sql
        );
        let mut values = clause.params;
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::Database(format!("failed to prepare search: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), snapshot_from_row)
            .map_err(|e| Error::Database(format!("failed to search snapshots: {e}")))?;
        let mut snapshots = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read snapshot row: {e}")))?;

        let ids: Vec<i64> = snapshots.iter().map(|s| s.id).collect();
        let mut tags = self.tags_for(&ids)?;
        for snapshot in &mut snapshots {
            snapshot.tags = tags.remove(&snapshot.id).unwrap_or_default();
        }

        let total = usize::try_from(total).unwrap_or_default();
        Ok(SearchResults {
            has_more: query.offset.saturating_add(snapshots.len()) < total,
            snapshots,
            total,
        })
    }

    /// Tag names per snapshot id, each list sorted by name.
    fn tags_for(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        let mut map: HashMap<i64, Vec<String>> = HashMap::new();
        if ids.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT st.snapshot_id, t.name FROM snapshot_tags st
             JOIN tags t ON t.id = st.tag_id
             WHERE st.snapshot_id IN ({})
             ORDER BY t.name",
            placeholders(ids.len())
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::Database(format!("failed to prepare tag query: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Database(format!("failed to query tags: {e}")))?;

        for row in rows {
            let (id, name) =
                row.map_err(|e| Error::Database(format!("failed to read tag row: {e}")))?;
            map.entry(id).or_default().push(name);
        }
        Ok(map)
    }
}

fn fetch_one(conn: &Connection, id: i64) -> Result<Option<Snapshot>> {
    conn.query_row(
        &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots s WHERE s.id = ?1"),
        params![id],
        snapshot_from_row,
    )
    .optional()
    .map_err(|e| Error::Database(format!("failed to load snapshot {id}: {e}")))
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let metadata: String = row.get(6)?;
    let metadata = serde_json::from_str(&metadata)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Snapshot {
        id: row.get(0)?,
        content: row.get(1)?,
        anchor_date: parse_datetime(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
        deleted_at: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_datetime(&s)),
        tags: Vec::new(),
        metadata,
    })
}
