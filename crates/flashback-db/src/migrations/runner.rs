use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use flashback_common::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use super::Migration;
use super::ledger::Ledger;

/// Outcome of a forward run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied by this run, in order.
    pub applied: Vec<String>,
    /// Versions that were already in the ledger.
    pub skipped: Vec<String>,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Versions reverted, newest first.
    pub reverted: Vec<String>,
    pub skipped: Vec<SkippedMigration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMigration {
    pub version: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ledger names a version the registry no longer contains.
    NotInRegistry,
    /// The unit has no reverse action.
    Irreversible,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotInRegistry => f.write_str("not found in migration registry"),
            SkipReason::Irreversible => f.write_str("has no down migration"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applied(DateTime<Utc>),
    /// Recorded in the ledger but absent from the registry.
    Orphaned(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: String,
    pub description: Option<&'static str>,
    pub state: MigrationState,
}

/// Applies and reverts an ordered set of migrations against a borrowed
/// connection.
///
/// Each unit is its own unit of work: a failure stops the run but leaves
/// everything applied before it recorded, so a later run resumes at the
/// failed unit.
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'m> {
    migrations: &'m [Migration],
}

impl Migrator<'static> {
    /// Migrator over the built-in registry.
    pub fn builtin() -> Result<Self> {
        Migrator::new(super::registry())
    }
}

impl<'m> Migrator<'m> {
    /// Rejects registries with empty or duplicate versions.
    pub fn new(migrations: &'m [Migration]) -> Result<Self> {
        let mut seen = HashSet::with_capacity(migrations.len());
        for migration in migrations {
            if migration.version.trim().is_empty() {
                return Err(Error::Migration(format!(
                    "migration \"{}\" has an empty version",
                    migration.description
                )));
            }
            if !seen.insert(migration.version) {
                return Err(Error::Migration(format!(
                    "duplicate migration version {}",
                    migration.version
                )));
            }
        }
        Ok(Self { migrations })
    }

    pub fn migrations(&self) -> &'m [Migration] {
        self.migrations
    }

    pub fn find(&self, version: &str) -> Option<&'m Migration> {
        self.migrations.iter().find(|m| m.version == version)
    }

    /// Apply every unit not yet in the ledger, in registry order.
    ///
    /// Stops at the first failing unit. The returned error carries the
    /// unit's own error as its source and the number of units this run had
    /// already applied.
    pub fn run(&self, conn: &Connection) -> Result<MigrationReport> {
        info!("starting database migrations");
        let ledger = Ledger::new(conn);
        ledger.ensure()?;

        let mut report = MigrationReport::default();
        for migration in self.migrations {
            if ledger.is_applied(migration.version)? {
                debug!("migration {} already applied, skipping", migration.version);
                report.skipped.push(migration.version.to_string());
                continue;
            }

            info!(
                "applying migration {}: {}",
                migration.version, migration.description
            );
            let applied = (migration.up)(conn).and_then(|()| {
                ledger.record_applied(migration.version)?;
                Ok(())
            });
            if let Err(e) = applied {
                error!("migration {} failed: {e}", migration.version);
                return Err(Error::MigrationApply {
                    version: migration.version.to_string(),
                    completed: report.applied.len(),
                    source: Box::new(e),
                });
            }

            info!("migration {} applied", migration.version);
            report.applied.push(migration.version.to_string());
        }

        info!(
            "migrations complete: {} applied, {} already present",
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Revert the `count` most recently applied units, newest first.
    ///
    /// Ledger entries whose unit is missing from the registry, or whose unit
    /// has no reverse action, are skipped with a warning and left in place.
    /// The first failing reverse action stops the rollback.
    pub fn rollback(&self, conn: &Connection, count: usize) -> Result<RollbackReport> {
        let ledger = Ledger::new(conn);
        let applied = ledger.list_applied().unwrap_or_else(|e| {
            warn!("could not read migration ledger, treating it as empty: {e}");
            Vec::new()
        });

        let start = applied.len().saturating_sub(count);
        let mut report = RollbackReport::default();

        for entry in applied[start..].iter().rev() {
            let version = entry.version.as_str();

            let Some(migration) = self.find(version) else {
                warn!("migration {version} not found in registry, skipping rollback");
                report.skipped.push(SkippedMigration {
                    version: version.to_string(),
                    reason: SkipReason::NotInRegistry,
                });
                continue;
            };
            let Some(down) = migration.down else {
                warn!("migration {version} has no down migration, skipping rollback");
                report.skipped.push(SkippedMigration {
                    version: version.to_string(),
                    reason: SkipReason::Irreversible,
                });
                continue;
            };

            info!("rolling back migration {version}");
            let reverted = down(conn).and_then(|()| {
                ledger.remove_applied(version)?;
                Ok(())
            });
            if let Err(e) = reverted {
                error!("rollback of {version} failed: {e}");
                return Err(Error::MigrationRevert {
                    version: version.to_string(),
                    completed: report.reverted.len(),
                    source: Box::new(e),
                });
            }

            info!("migration {version} rolled back");
            report.reverted.push(version.to_string());
        }

        Ok(report)
    }

    /// Registry units not yet recorded in the ledger, in application order.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<&'m Migration>> {
        let ledger = Ledger::new(conn);
        ledger.ensure()?;
        let mut pending = Vec::new();
        for migration in self.migrations {
            if !ledger.is_applied(migration.version)? {
                pending.push(migration);
            }
        }
        Ok(pending)
    }

    /// Registry units with their ledger state, followed by orphaned ledger
    /// entries in the order they were applied.
    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let ledger = Ledger::new(conn);
        ledger.ensure()?;
        let applied = ledger.list_applied()?;

        let mut statuses: Vec<MigrationStatus> = self
            .migrations
            .iter()
            .map(|m| {
                let state = applied
                    .iter()
                    .find(|a| a.version == m.version)
                    .map_or(MigrationState::Pending, |a| {
                        MigrationState::Applied(a.applied_at)
                    });
                MigrationStatus {
                    version: m.version.to_string(),
                    description: Some(m.description),
                    state,
                }
            })
            .collect();

        statuses.extend(
            applied
                .iter()
                .filter(|a| self.find(&a.version).is_none())
                .map(|a| MigrationStatus {
                    version: a.version.clone(),
                    description: None,
                    state: MigrationState::Orphaned(a.applied_at),
                }),
        );
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{MigrationFn, exec, object_exists, registry};

    // Each test unit leaves a trace row so tests can see which actions ran
    // and in what order.
    fn trace(conn: &Connection, event: &str) -> Result<()> {
        exec(
            conn,
            &format!(
                "CREATE TABLE IF NOT EXISTS trace (seq INTEGER PRIMARY KEY, event TEXT);
                 INSERT INTO trace (event) VALUES ('{event}');"
            ),
        )
    }

    fn traced(conn: &Connection) -> Vec<String> {
        let Ok(mut stmt) = conn.prepare("SELECT event FROM trace ORDER BY seq") else {
            return Vec::new();
        };
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    fn up_a(conn: &Connection) -> Result<()> {
        trace(conn, "up a")?;
        exec(conn, "CREATE TABLE IF NOT EXISTS a (id INTEGER PRIMARY KEY)")
    }
    fn down_a(conn: &Connection) -> Result<()> {
        trace(conn, "down a")?;
        exec(conn, "DROP TABLE IF EXISTS a")
    }
    // Depends on a's table.
    fn up_b(conn: &Connection) -> Result<()> {
        trace(conn, "up b")?;
        exec(conn, "CREATE INDEX IF NOT EXISTS idx_a_id ON a (id)")
    }
    fn down_b(conn: &Connection) -> Result<()> {
        trace(conn, "down b")?;
        exec(conn, "DROP INDEX IF EXISTS idx_a_id")
    }
    fn up_c(conn: &Connection) -> Result<()> {
        trace(conn, "up c")?;
        exec(conn, "CREATE TABLE IF NOT EXISTS c (id INTEGER PRIMARY KEY)")
    }
    fn down_c(conn: &Connection) -> Result<()> {
        trace(conn, "down c")?;
        exec(conn, "DROP TABLE IF EXISTS c")
    }
    fn broken(conn: &Connection) -> Result<()> {
        trace(conn, "broken")?;
        exec(conn, "ALTER TABLE no_such_table ADD COLUMN x TEXT")
    }

    fn unit(version: &'static str, up: MigrationFn, down: Option<MigrationFn>) -> Migration {
        Migration {
            version,
            description: "test unit",
            up,
            down,
        }
    }

    fn abc() -> Vec<Migration> {
        vec![
            unit("001_a", up_a, Some(down_a)),
            unit("002_b", up_b, Some(down_b)),
            unit("003_c", up_c, Some(down_c)),
        ]
    }

    fn ledger_versions(conn: &Connection) -> Vec<String> {
        Ledger::new(conn)
            .list_applied()
            .unwrap()
            .into_iter()
            .map(|a| a.version)
            .collect()
    }

    #[test]
    fn new_rejects_duplicate_versions() {
        let units = vec![unit("001_a", up_a, None), unit("001_a", up_c, None)];
        let err = Migrator::new(&units).unwrap_err();
        assert!(matches!(err, Error::Migration(_)));
        assert!(err.to_string().contains("001_a"));
    }

    #[test]
    fn new_rejects_empty_version() {
        let units = vec![unit("  ", up_a, None)];
        assert!(matches!(
            Migrator::new(&units).unwrap_err(),
            Error::Migration(_)
        ));
    }

    #[test]
    fn builtin_registry_is_valid() {
        let migrator = Migrator::builtin().unwrap();
        assert_eq!(migrator.migrations().len(), registry().len());
    }

    #[test]
    fn run_applies_in_registry_order() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let report = Migrator::new(&units).unwrap().run(&conn).unwrap();

        assert_eq!(report.applied, vec!["001_a", "002_b", "003_c"]);
        assert!(report.skipped.is_empty());
        assert_eq!(traced(&conn), vec!["up a", "up b", "up c"]);
        assert_eq!(ledger_versions(&conn), vec!["001_a", "002_b", "003_c"]);
    }

    #[test]
    fn registry_order_wins_over_version_order() {
        let conn = Connection::open_in_memory().unwrap();
        let units = vec![
            unit("002_a", up_a, None),
            unit("001_b", up_b, None),
        ];
        Migrator::new(&units).unwrap().run(&conn).unwrap();
        assert_eq!(traced(&conn), vec!["up a", "up b"]);
        assert_eq!(ledger_versions(&conn), vec!["002_a", "001_b"]);
    }

    #[test]
    fn second_run_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        let report = migrator.run(&conn).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, vec!["001_a", "002_b", "003_c"]);
        assert_eq!(traced(&conn), vec!["up a", "up b", "up c"]);
        assert_eq!(ledger_versions(&conn).len(), 3);
    }

    #[test]
    fn newly_appended_units_are_picked_up() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        Migrator::new(&units[..1]).unwrap().run(&conn).unwrap();

        let report = Migrator::new(&units).unwrap().run(&conn).unwrap();
        assert_eq!(report.applied, vec!["002_b", "003_c"]);
        assert_eq!(report.skipped, vec!["001_a"]);
        assert_eq!(ledger_versions(&conn), vec!["001_a", "002_b", "003_c"]);
    }

    #[test]
    fn failure_halts_run_and_keeps_earlier_units() {
        let conn = Connection::open_in_memory().unwrap();
        let units = vec![
            unit("001_a", up_a, Some(down_a)),
            unit("002_b", broken, None),
            unit("003_c", up_c, Some(down_c)),
        ];

        let err = Migrator::new(&units).unwrap().run(&conn).unwrap_err();
        match &err {
            Error::MigrationApply {
                version,
                completed,
                source,
            } => {
                assert_eq!(version, "002_b");
                assert_eq!(*completed, 1);
                assert!(source.to_string().contains("no_such_table"));
            }
            other => panic!("expected MigrationApply, got {other:?}"),
        }

        assert_eq!(traced(&conn), vec!["up a", "broken"]);
        assert_eq!(ledger_versions(&conn), vec!["001_a"]);
        assert!(!object_exists(&conn, "table", "c"));
    }

    #[test]
    fn run_resumes_at_failed_unit_once_fixed() {
        let conn = Connection::open_in_memory().unwrap();
        let failing = vec![unit("001_a", up_a, None), unit("002_b", broken, None)];
        assert!(Migrator::new(&failing).unwrap().run(&conn).is_err());

        let fixed = vec![unit("001_a", up_a, None), unit("002_b", up_b, None)];
        let report = Migrator::new(&fixed).unwrap().run(&conn).unwrap();
        assert_eq!(report.applied, vec!["002_b"]);
        assert_eq!(traced(&conn), vec!["up a", "broken", "up b"]);
    }

    #[test]
    fn rollback_reverts_newest_first() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        let report = migrator.rollback(&conn, 2).unwrap();
        assert_eq!(report.reverted, vec!["003_c", "002_b"]);
        assert!(report.skipped.is_empty());
        assert_eq!(
            traced(&conn),
            vec!["up a", "up b", "up c", "down c", "down b"]
        );
        assert_eq!(ledger_versions(&conn), vec!["001_a"]);
    }

    #[test]
    fn rollback_defaults_to_single_unit_and_zero_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        assert_eq!(migrator.rollback(&conn, 0).unwrap(), RollbackReport::default());
        assert_eq!(migrator.rollback(&conn, 1).unwrap().reverted, vec!["003_c"]);
        assert_eq!(ledger_versions(&conn), vec!["001_a", "002_b"]);
    }

    #[test]
    fn rollback_count_larger_than_history_reverts_everything() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        let report = migrator.rollback(&conn, 10).unwrap();
        assert_eq!(report.reverted, vec!["003_c", "002_b", "001_a"]);
        assert!(ledger_versions(&conn).is_empty());
        assert!(!object_exists(&conn, "table", "a"));
    }

    #[test]
    fn rollback_stops_at_failing_revert() {
        let conn = Connection::open_in_memory().unwrap();
        let units = vec![
            unit("001_a", up_a, Some(down_a)),
            unit("002_b", up_b, Some(broken)),
            unit("003_c", up_c, Some(down_c)),
        ];
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        let err = migrator.rollback(&conn, 2).unwrap_err();
        match &err {
            Error::MigrationRevert {
                version, completed, ..
            } => {
                assert_eq!(version, "002_b");
                assert_eq!(*completed, 1);
            }
            other => panic!("expected MigrationRevert, got {other:?}"),
        }

        // c is gone for good; b and a remain recorded and nothing is re-applied.
        assert_eq!(ledger_versions(&conn), vec!["001_a", "002_b"]);
        assert_eq!(
            traced(&conn),
            vec!["up a", "up b", "up c", "down c", "broken"]
        );
        assert!(!object_exists(&conn, "table", "c"));
    }

    #[test]
    fn rollback_skips_irreversible_unit_and_continues() {
        let conn = Connection::open_in_memory().unwrap();
        let units = vec![
            unit("001_a", up_a, Some(down_a)),
            unit("002_b", up_b, None),
            unit("003_c", up_c, Some(down_c)),
        ];
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();

        let report = migrator.rollback(&conn, 3).unwrap();
        assert_eq!(report.reverted, vec!["003_c", "001_a"]);
        assert_eq!(
            report.skipped,
            vec![SkippedMigration {
                version: "002_b".into(),
                reason: SkipReason::Irreversible,
            }]
        );
        assert_eq!(ledger_versions(&conn), vec!["002_b"]);
    }

    #[test]
    fn rollback_skips_versions_missing_from_registry() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        migrator.run(&conn).unwrap();
        Ledger::new(&conn).record_applied("004_from_the_future").unwrap();

        let report = migrator.rollback(&conn, 2).unwrap();
        assert_eq!(report.reverted, vec!["003_c"]);
        assert_eq!(report.skipped[0].version, "004_from_the_future");
        assert_eq!(report.skipped[0].reason, SkipReason::NotInRegistry);
        assert_eq!(
            ledger_versions(&conn),
            vec!["001_a", "002_b", "004_from_the_future"]
        );
    }

    #[test]
    fn rollback_on_fresh_database_treats_ledger_as_empty() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let report = Migrator::new(&units).unwrap().rollback(&conn, 1).unwrap();
        assert_eq!(report, RollbackReport::default());
        assert!(traced(&conn).is_empty());
    }

    #[test]
    fn pending_lists_unapplied_units() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        Migrator::new(&units[..2]).unwrap().run(&conn).unwrap();

        let pending: Vec<_> = migrator
            .pending(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(pending, vec!["003_c"]);
    }

    #[test]
    fn status_reports_applied_pending_and_orphaned() {
        let conn = Connection::open_in_memory().unwrap();
        let units = abc();
        let migrator = Migrator::new(&units).unwrap();
        Migrator::new(&units[..1]).unwrap().run(&conn).unwrap();
        Ledger::new(&conn).record_applied("000_retired").unwrap();

        let status = migrator.status(&conn).unwrap();
        let summary: Vec<_> = status
            .iter()
            .map(|s| {
                let state = match s.state {
                    MigrationState::Pending => "pending",
                    MigrationState::Applied(_) => "applied",
                    MigrationState::Orphaned(_) => "orphaned",
                };
                (s.version.as_str(), state)
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("001_a", "applied"),
                ("002_b", "pending"),
                ("003_c", "pending"),
                ("000_retired", "orphaned"),
            ]
        );
        assert!(status[3].description.is_none());
    }
}
