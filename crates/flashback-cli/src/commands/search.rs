use anyhow::{Result, bail};
use chrono::Local;
use flashback_common::{Snapshot, SortOrder};
use flashback_db::{SearchQuery, SearchResults, SnapshotStore};

use super::{Context, ensure_migrated};
use crate::cli::{DeleteArgs, SearchArgs};
use crate::input::parse_date;

const PREVIEW_CHARS: usize = 80;

pub fn search(ctx: &Context, args: &SearchArgs) -> Result<()> {
    let query = build_query(args)?;
    let db = ctx.open_database()?;
    let conn = db.connection()?;
    ensure_migrated(&conn)?;
    let results = SnapshotStore::new(&conn).search(&query)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for line in render(&results, &query) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn delete(ctx: &Context, args: &DeleteArgs) -> Result<()> {
    let db = ctx.open_database()?;
    let conn = db.connection()?;
    ensure_migrated(&conn)?;
    if !SnapshotStore::new(&conn).soft_delete(args.id)? {
        bail!("snapshot #{} not found or already deleted", args.id);
    }
    println!("Deleted snapshot #{}", args.id);
    Ok(())
}

pub(crate) fn build_query(args: &SearchArgs) -> Result<SearchQuery> {
    let anchor_from = args.from.as_deref().map(parse_date).transpose()?;
    let anchor_to = args.to.as_deref().map(parse_date).transpose()?;
    if let (Some(from), Some(to)) = (anchor_from, anchor_to) {
        if from > to {
            bail!("--from must not be later than --to");
        }
    }
    Ok(SearchQuery {
        text: args.query.clone(),
        tags: args.tags.clone(),
        tags_any: args.any_tags.clone(),
        anchor_from,
        anchor_to,
        sort: if args.asc {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        },
        limit: args.limit,
        offset: args.offset,
        include_deleted: args.include_deleted,
    })
}

fn render(results: &SearchResults, query: &SearchQuery) -> Vec<String> {
    if results.snapshots.is_empty() {
        return vec!["No snapshots found".to_string()];
    }
    let mut lines: Vec<String> = results.snapshots.iter().map(summary_line).collect();
    let shown_to = query.offset + results.snapshots.len();
    lines.push(format!(
        "Showing {}-{} of {}",
        query.offset + 1,
        shown_to,
        results.total
    ));
    if results.has_more {
        lines.push(format!("More results: --offset {shown_to}"));
    }
    lines
}

fn summary_line(snapshot: &Snapshot) -> String {
    let first_line = snapshot.content.lines().next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if preview.len() < snapshot.content.len() {
        preview.push_str("...");
    }
    let mut line = format!(
        "#{:<5} {}  {}",
        snapshot.id,
        snapshot.anchor_date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        preview
    );
    if !snapshot.tags.is_empty() {
        line.push_str(&format!("  [{}]", snapshot.tags.join(", ")));
    }
    if snapshot.is_deleted() {
        line.push_str("  (deleted)");
    }
    line
}
