pub mod error;
pub mod snapshot;

pub use error::{Error, Result};
pub use snapshot::{NewSnapshot, Snapshot, SortOrder};
