//! SQLite storage for Flashback snapshots.
//!
//! The schema is owned by the migration engine in [`migrations`]; the
//! [`SnapshotStore`] assumes it runs against a fully migrated connection.

pub mod database;
pub mod migrations;
pub mod search;
pub mod slug;
pub mod snapshot_store;
mod timestamp;

pub use database::{ConnectionOptions, Database};
pub use migrations::{
    Migration, MigrationReport, MigrationState, MigrationStatus, Migrator, RollbackReport,
    SkipReason, SkippedMigration,
};
pub use search::{Predicate, SearchQuery, SearchResults};
pub use snapshot_store::SnapshotStore;
