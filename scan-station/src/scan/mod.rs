//! Scan pipeline
//!
//! ```text
//! raw input → ScanCode::classify → machine::step / machine::apply
//!                                        │
//!                                   ScanSession
//!                                        ├── event log (redb)
//!                                        ├── work-state snapshot
//!                                        ├── sync triggers
//!                                        └── operator feedback
//! ```

mod auto_close;
pub mod code;
pub mod machine;
mod session;

pub use auto_close::AutoCloseWorker;
pub use code::ScanCode;
pub use machine::{WorkSnapshot, WorkState};
pub use session::ScanSession;
