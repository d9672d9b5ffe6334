//! Shared types for the scan station
//!
//! The event model and the collector wire protocol live here so that the
//! station executable and any future reporting tooling agree on one source
//! of truth for field names and day derivation.

pub mod event;
pub mod util;
pub mod wire;

// Re-exports
pub use event::{ErrorCode, EventContext, EventKind, ScanEvent, EVENT_SOURCE};
pub use wire::{BatchResponse, EventBatch, PingResponse, WireEvent};
