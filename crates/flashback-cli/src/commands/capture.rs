use std::io::IsTerminal;

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use dialoguer::Input;
use flashback_common::NewSnapshot;
use flashback_db::SnapshotStore;

use super::{Context, ensure_migrated};
use crate::cli::CaptureArgs;
use crate::input::{parse_date, parse_metadata, split_tags};

pub fn run(ctx: &Context, args: &CaptureArgs) -> Result<()> {
    let input = if args.content.is_none() && std::io::stdin().is_terminal() {
        prompt(args)?
    } else {
        from_args(args)?
    };

    let db = ctx.open_database()?;
    let conn = db.connection()?;
    ensure_migrated(&conn)?;
    let snapshot = SnapshotStore::new(&conn).create(&input)?;

    println!(
        "Captured snapshot #{} at {}",
        snapshot.id,
        snapshot.anchor_date.to_rfc3339()
    );
    if !snapshot.tags.is_empty() {
        println!("  tags: {}", snapshot.tags.join(", "));
    }
    Ok(())
}

/// Build a snapshot purely from flags.
pub(crate) fn from_args(args: &CaptureArgs) -> Result<NewSnapshot> {
    let content = args.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        bail!("Content is required (pass --content or run in a terminal)");
    }
    let anchor_date = match args.anchor.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_date(raw)?,
        _ => Utc::now(),
    };
    Ok(NewSnapshot::text(content, anchor_date)
        .with_tags(split_tags(args.tags.as_deref().unwrap_or_default()))
        .with_metadata(parse_metadata(args.metadata.as_deref())?))
}

/// Ask for every field, pre-filled with whatever flags were given.
fn prompt(args: &CaptureArgs) -> Result<NewSnapshot> {
    println!();
    println!("  New snapshot");
    println!("  ------------");
    println!();

    let content: String = Input::new()
        .with_prompt("Content")
        .validate_with(|text: &String| {
            if text.trim().is_empty() {
                Err("Content is required")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("content input cancelled")?;

    let anchor: String = Input::new()
        .with_prompt("Anchor date (blank for now)")
        .with_initial_text(args.anchor.clone().unwrap_or_default())
        .allow_empty(true)
        .validate_with(|raw: &String| {
            if raw.trim().is_empty() {
                return Ok(());
            }
            parse_date(raw).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
        .context("anchor input cancelled")?;

    let tags: String = Input::new()
        .with_prompt("Tags (comma separated)")
        .with_initial_text(args.tags.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("tags input cancelled")?;

    let metadata: String = Input::new()
        .with_prompt("Metadata (JSON, optional)")
        .with_initial_text(args.metadata.clone().unwrap_or_default())
        .allow_empty(true)
        .validate_with(|raw: &String| {
            parse_metadata(Some(raw))
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .context("metadata input cancelled")?;

    from_args(&CaptureArgs {
        content: Some(content),
        anchor: Some(anchor),
        tags: Some(tags),
        metadata: Some(metadata),
    })
}
