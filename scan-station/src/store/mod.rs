//! redb-based storage layer
//!
//! One database file holds three tables:
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `events` | `uuid` | `ScanEvent` | Scan log (append-mostly) |
//! | `events_by_day` | `(day, uuid)` | `()` | Day index |
//! | `settings` | `key` | JSON value | Settings + work-state snapshot |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`, so every appended event is on
//! disk before `handle_scan` returns. Scanner stations get power-cycled
//! without warning; the log must survive that.

mod events;
mod settings;

pub use events::EventStore;
pub use settings::keys;
pub use settings::{SettingsStore, StationSettings};

use std::path::Path;
use std::sync::Arc;

use redb::Database;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate event id: {0}")]
    DuplicateKey(String),

    #[error("Day index entry points at missing event: {0}")]
    IndexEntryMissing(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Open or create the station database at the given path and initialize all
/// tables, so later read transactions never race table creation.
pub fn open_database(path: impl AsRef<Path>) -> StoreResult<Arc<Database>> {
    let db = Database::create(path)?;
    init_tables(&db)?;
    Ok(Arc::new(db))
}

/// Open an in-memory database (for testing)
#[cfg(test)]
pub fn open_in_memory() -> StoreResult<Arc<Database>> {
    let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
    init_tables(&db)?;
    Ok(Arc::new(db))
}

fn init_tables(db: &Database) -> StoreResult<()> {
    let write_txn = db.begin_write()?;
    {
        let _ = write_txn.open_table(events::EVENTS_TABLE)?;
        let _ = write_txn.open_table(events::DAY_INDEX_TABLE)?;
        let _ = write_txn.open_table(settings::SETTINGS_TABLE)?;
    }
    write_txn.commit()?;
    Ok(())
}
