use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use flashback_common::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Connection settings applied right after a database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Upper bound on how long one statement waits for a lock.
    pub busy_timeout: Duration,
    /// Write-ahead logging. Ignored for in-memory databases.
    pub wal: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(10),
            wal: true,
        }
    }
}

/// Owns one SQLite connection and hands it out to callers.
///
/// Opening and dropping a `Database` is the caller's business; the migration
/// engine and the snapshot store only ever borrow the connection.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(db_path: &Path, options: ConnectionOptions) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Connection(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            Error::Connection(format!("failed to open {}: {e}", db_path.display()))
        })?;
        configure(&conn, options, true)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(db_path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(format!("failed to open in-memory database: {e}")))?;
        configure(&conn, ConnectionOptions::default(), false)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    /// Round-trip a trivial query to prove the database is usable.
    pub fn ping(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Connection(format!("database is not reachable: {e}")))?;
        Ok(())
    }
}

fn configure(conn: &Connection, options: ConnectionOptions, on_disk: bool) -> Result<()> {
    conn.busy_timeout(options.busy_timeout)
        .map_err(|e| Error::Connection(format!("failed to set busy timeout: {e}")))?;

    let pragmas = if on_disk && options.wal {
        "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"
    } else {
        "PRAGMA foreign_keys=ON;"
    };
    conn.execute_batch(pragmas)
        .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;
    debug!("connection configured (wal={})", on_disk && options.wal);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_answers_ping() {
        let db = Database::in_memory().unwrap();
        db.ping().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flashback.db");

        let db = Database::open(&path, ConnectionOptions::default()).unwrap();
        db.ping().unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));

        let conn = db.connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn open_without_wal_keeps_default_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.db");
        let options = ConnectionOptions {
            wal: false,
            ..ConnectionOptions::default()
        };

        let db = Database::open(&path, options).unwrap();
        let conn = db.connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "delete");
    }
}
