//! Event sync - push unsent scans to the collector
//!
//! ```text
//! SyncWorker
//!   ├── Debounce: item scans (re)arm a short deadline → sync when it fires
//!   ├── Periodic: fixed interval → sync when online, ping probe when offline
//!   └── Close:    box/city close bypasses the debounce with a direct sync call
//! ```

mod engine;
mod service;
#[cfg(test)]
pub(crate) mod testing;
mod worker;

pub use engine::{SharedSyncStatus, SyncEngine, SyncError, SyncOutcome, SyncStatus};
pub use service::{Collector, CollectorService, SyncTarget};
pub use worker::{SyncHandle, SyncTrigger, SyncWorker};
