use std::path::PathBuf;
use std::time::Duration;

/// Station configuration
///
/// # Environment variables
///
/// Every knob can be set through the environment (a `.env` file next to the
/// binary works too, loaded at startup):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | SCAN_DATA_DIR | ./scan-data | Database, exports and logs live here |
/// | SCAN_SYNC_URL | (unset) | Collector base URL, seeds the store on first run |
/// | SCAN_API_KEY | (unset) | Collector API key, never persisted |
/// | SCAN_OPERATOR | (unset) | Operator name, seeds the store on first run |
/// | SCAN_BATCH_CAP | 20 | Max events per sync batch |
/// | SCAN_DEBOUNCE_MS | 1000 | Quiet window after an item scan before syncing |
/// | SCAN_PERIODIC_SECS | 10 | Periodic sync / connectivity probe interval |
/// | SCAN_AUTO_CLOSE_POLL_SECS | 60 | How often the stale-box check runs |
/// | SCAN_AUTO_CLOSE_MINS | 60 | Open box older than this gets auto-closed |
/// | SCAN_LOG_DIR | {data_dir}/logs | Rolling log file directory |
/// | SCAN_LOG_TO_FILE | false | Write a daily log file in addition to stdout |
///
/// # Example
///
/// ```ignore
/// SCAN_DATA_DIR=/var/lib/scan-station SCAN_SYNC_URL=https://collector.example cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the database, CSV exports and log files
    pub data_dir: String,
    /// Collector base URL; only used to seed the settings store on first run
    pub sync_url: Option<String>,
    /// Collector API key; stays in the environment, never written to the store
    pub api_key: Option<String>,
    /// Operator name; only used to seed the settings store on first run
    pub operator: Option<String>,
    /// Upper bound on events per sync batch
    pub batch_cap: usize,
    /// Debounce window after an item scan (milliseconds)
    pub debounce_ms: u64,
    /// Periodic sync interval (seconds)
    pub periodic_secs: u64,
    /// Stale-box poll interval (seconds)
    pub auto_close_poll_secs: u64,
    /// Box age limit before auto-close (minutes)
    pub auto_close_mins: u64,
    /// Rolling log file directory
    pub log_dir: String,
    /// Whether to write log files at all
    pub log_to_file: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("SCAN_DATA_DIR").unwrap_or_else(|_| "./scan-data".into());
        let log_dir =
            std::env::var("SCAN_LOG_DIR").unwrap_or_else(|_| format!("{data_dir}/logs"));

        Self {
            sync_url: std::env::var("SCAN_SYNC_URL").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("SCAN_API_KEY").ok().filter(|v| !v.is_empty()),
            operator: std::env::var("SCAN_OPERATOR").ok().filter(|v| !v.is_empty()),
            batch_cap: std::env::var("SCAN_BATCH_CAP")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(20),
            debounce_ms: std::env::var("SCAN_DEBOUNCE_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1000),
            periodic_secs: std::env::var("SCAN_PERIODIC_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
            auto_close_poll_secs: std::env::var("SCAN_AUTO_CLOSE_POLL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
            auto_close_mins: std::env::var("SCAN_AUTO_CLOSE_MINS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
            log_to_file: std::env::var("SCAN_LOG_TO_FILE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            data_dir,
            log_dir,
        }
    }

    /// Path of the redb database file
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("scan-station.redb")
    }

    /// Log directory as a path, `None` when file logging is off
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_to_file.then(|| PathBuf::from(&self.log_dir))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn periodic(&self) -> Duration {
        Duration::from_secs(self.periodic_secs)
    }

    pub fn auto_close_poll(&self) -> Duration {
        Duration::from_secs(self.auto_close_poll_secs)
    }

    pub fn auto_close_after(&self) -> Duration {
        Duration::from_secs(self.auto_close_mins * 60)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
