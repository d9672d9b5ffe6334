//! Logging setup
//!
//! Console output always; optional daily-rolling file output when a log
//! directory is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

fn env_filter() -> EnvFilter {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        from_env
    } else if cfg!(debug_assertions) {
        EnvFilter::new("info,scan_station=debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Initialize the logger
///
/// With a log directory, a daily-rolling file layer is added next to the
/// console layer. The returned guard must stay alive for the process
/// lifetime; dropping it stops the background writer and loses buffered
/// lines.
pub fn init_logger(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let stdout_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(true)
        .with_target(true)
        .with_writer(std::io::stdout);

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "scan-station.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_timer(LocalTimer)
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking_file);

            registry.with(file_layer).init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

/// Route panics through the log before the process dies
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        let msg = info.to_string();
        eprintln!("!!! APPLICATION PANIC !!!\nMessage: {msg}\nBacktrace:\n{backtrace}");
        tracing::error!(target: "panic", message = %msg, backtrace = %backtrace, "panic occurred");
    }));
}
