//! Scan station - warehouse packing logged one barcode at a time
//!
//! # Overview
//!
//! An operator walks the packing floor with a scanner gun. Every scan is a
//! command: open a city, open a box, drop an item in, close up. The station
//! validates each scan against the session state, writes one durable event
//! per scan, and drains the log to the central collector whenever the
//! network allows. The log is the source of truth; the collector is a copy.
//!
//! # Module structure
//!
//! ```text
//! scan-station/src/
//! ├── core/      # config, station state, background tasks
//! ├── scan/      # code classification, state machine, session, auto-close
//! ├── store/     # redb event log + settings
//! ├── sync/      # collector client, sync engine, debounce worker
//! ├── export     # day CSV export
//! ├── console    # stdin front end
//! ├── feedback   # operator feedback seam
//! └── utils/     # errors, logging
//! ```

pub mod console;
pub mod core;
pub mod export;
pub mod feedback;
pub mod scan;
pub mod store;
pub mod sync;
pub mod utils;

use tracing_appender::non_blocking::WorkerGuard;

// Re-export the types the binary wires together
pub use crate::core::{BackgroundTasks, Config, StationState};
pub use console::Console;
pub use feedback::{ConsoleFeedback, Feedback};
pub use utils::{AppError, AppResult};

/// Load `.env`, read the configuration and set up logging
///
/// The returned guard flushes the file appender; hold it
/// until the process exits.
pub fn setup_environment() -> AppResult<(Config, Option<WorkerGuard>)> {
    // .env before from_env, so the file can supply SCAN_* values
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let guard = utils::logger::init_logger(config.log_path().as_deref())?;
    utils::logger::install_panic_hook();
    Ok((config, guard))
}

pub fn print_banner() {
    println!(
        r#"
   _____
  / ___/________ _____
  \__ \/ ___/ __ `/ __ \
 ___/ / /__/ /_/ / / / /
/____/\___/\__,_/_/ /_/
    _____ __        __  _
   / ___// /_____ _/ /_(_)___  ____
   \__ \/ __/ __ `/ __/ / __ \/ __ \
  ___/ / /_/ /_/ / /_/ / /_/ / / / /
 /____/\__/\__,_/\__/_/\____/_/ /_/
    "#
    );
}
