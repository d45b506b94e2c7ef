use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::Utc;
use flashback_db::Migrator;
use flashback_db::migrations::Ledger;
use tracing::info;

use super::Context;
use super::migrate::run_summary;
use crate::cli::SetupArgs;

pub const SETUP_MARKER: &str = ".setup_completed";

/// Check connectivity, bring the schema up to date and leave a marker so
/// later runs know setup already happened.
pub fn run(ctx: &Context, args: &SetupArgs) -> Result<()> {
    let marker = marker_path(&ctx.config_dir);
    if marker.exists() && !args.force {
        let when = std::fs::read_to_string(&marker).unwrap_or_default();
        println!(
            "Setup already completed at {}. Use --force to run it again.",
            when.trim()
        );
        return Ok(());
    }

    println!("Database: {}", ctx.database_path().display());
    let db = ctx.open_database()?;
    db.ping().context("database connection check failed")?;
    println!("Connection OK");

    let conn = db.connection()?;
    let report = Migrator::builtin()?
        .run(&conn)
        .context("Migration failed")?;
    println!("{}", run_summary(&report));
    let recorded = Ledger::new(&conn).list_applied()?.len();
    println!("{recorded} migration(s) recorded");

    std::fs::create_dir_all(&ctx.config_dir)
        .with_context(|| format!("failed to create {}", ctx.config_dir.display()))?;
    std::fs::write(&marker, Utc::now().to_rfc3339())
        .with_context(|| format!("failed to write {}", marker.display()))?;
    info!("setup marker written to {}", marker.display());
    println!("Setup complete.");
    Ok(())
}

fn marker_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETUP_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;

    #[test]
    fn setup_migrates_and_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        run(&ctx, &SetupArgs { force: false }).unwrap();

        let marker = dir.path().join(SETUP_MARKER);
        let stamp = std::fs::read_to_string(&marker).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());

        let db = ctx.open_database().unwrap();
        let pending = Migrator::builtin()
            .unwrap()
            .pending(&db.connection().unwrap())
            .unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn existing_marker_short_circuits_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        std::fs::write(dir.path().join(SETUP_MARKER), "earlier").unwrap();

        run(&ctx, &SetupArgs { force: false }).unwrap();
        assert!(!ctx.database_path().exists());

        run(&ctx, &SetupArgs { force: true }).unwrap();
        assert!(ctx.database_path().exists());
        let stamp = std::fs::read_to_string(dir.path().join(SETUP_MARKER)).unwrap();
        assert_ne!(stamp, "earlier");
    }
}
