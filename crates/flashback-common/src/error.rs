use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    /// The registry itself is malformed (duplicate or empty versions).
    #[error("migration registry error: {0}")]
    Migration(String),

    /// A forward unit failed. `completed` counts the units applied earlier in
    /// the same run; they stay recorded in the ledger.
    #[error("migration {version} failed after {completed} applied: {source}")]
    MigrationApply {
        version: String,
        completed: usize,
        #[source]
        source: Box<Error>,
    },

    /// A reverse unit failed. `completed` counts the units reverted earlier in
    /// the same rollback; their ledger entries are already gone.
    #[error("rollback of {version} failed after {completed} reverted: {source}")]
    MigrationRevert {
        version: String,
        completed: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Number of units that completed before a migration or rollback failure.
    pub fn completed_units(&self) -> Option<usize> {
        match self {
            Error::MigrationApply { completed, .. } | Error::MigrationRevert { completed, .. } => {
                Some(*completed)
            }
            _ => None,
        }
    }
}
