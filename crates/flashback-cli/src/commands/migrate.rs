use anyhow::{Context as _, Result};
use flashback_db::{MigrationReport, MigrationState, MigrationStatus, Migrator, RollbackReport};

use super::Context;
use crate::cli::RollbackArgs;

pub fn migrate(ctx: &Context) -> Result<()> {
    let db = ctx.open_database()?;
    let conn = db.connection()?;
    let report = Migrator::builtin()?
        .run(&conn)
        .context("Migration failed")?;
    println!("{}", run_summary(&report));
    Ok(())
}

pub fn rollback(ctx: &Context, args: &RollbackArgs) -> Result<()> {
    let db = ctx.open_database()?;
    let conn = db.connection()?;
    let report = Migrator::builtin()?
        .rollback(&conn, args.count)
        .context("Rollback failed")?;
    for line in rollback_summary(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let db = ctx.open_database()?;
    let conn = db.connection()?;
    let rows = Migrator::builtin()?.status(&conn)?;
    for line in status_table(&rows) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_summary(report: &MigrationReport) -> String {
    if report.applied.is_empty() {
        "Database is up to date".to_string()
    } else {
        format!(
            "Applied {} migration(s): {}",
            report.applied.len(),
            report.applied.join(", ")
        )
    }
}

pub(crate) fn rollback_summary(report: &RollbackReport) -> Vec<String> {
    let mut lines = vec![if report.reverted.is_empty() {
        "Nothing was rolled back".to_string()
    } else {
        format!(
            "Rolled back {} migration(s): {}",
            report.reverted.len(),
            report.reverted.join(", ")
        )
    }];
    lines.extend(
        report
            .skipped
            .iter()
            .map(|s| format!("  skipped {}: {}", s.version, s.reason)),
    );
    lines
}

pub(crate) fn status_table(rows: &[MigrationStatus]) -> Vec<String> {
    let width = rows
        .iter()
        .map(|r| r.version.len())
        .max()
        .unwrap_or(0)
        .max("VERSION".len());
    let mut lines = vec![format!("{:<width$}  {:<24}  DESCRIPTION", "VERSION", "STATE")];
    for row in rows {
        let state = match row.state {
            MigrationState::Pending => "pending".to_string(),
            MigrationState::Applied(at) => format!("applied {}", at.format("%Y-%m-%d %H:%M:%S")),
            MigrationState::Orphaned(at) => format!("orphaned {}", at.format("%Y-%m-%d %H:%M:%S")),
        };
        lines.push(format!(
            "{:<width$}  {:<24}  {}",
            row.version,
            state,
            row.description.unwrap_or("-")
        ));
    }
    lines
}
