//! Console front end
//!
//! Reads stdin line by line. A line starting with `/` is a command, anything
//! else goes to the scan session exactly as a barcode gun would deliver it
//! (guns type the code and press Enter). Runs until `/quit`, EOF or a
//! termination signal.

use chrono::TimeZone;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::StationState;
use crate::export;
use crate::store::keys;
use crate::sync::SyncOutcome;
use crate::utils::{AppError, AppResult};

pub struct Console {
    state: StationState,
}

impl Console {
    pub fn new(state: StationState) -> Self {
        Self { state }
    }

    /// Drive the input loop; returns once the operator quits or the process
    /// is told to stop
    pub async fn run(&self) -> AppResult<()> {
        println!("Scan a code, or type /help for commands.");

        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut line = String::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            line.clear();
            tokio::select! {
                _ = &mut shutdown => {
                    println!();
                    break;
                }
                read = stdin.read_line(&mut line) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let input = line.trim();
                        if input.is_empty() {
                            continue;
                        }
                        if let Some(command) = input.strip_prefix('/') {
                            if !self.handle_command(command).await {
                                break;
                            }
                        } else {
                            self.handle_scan(input).await;
                        }
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }
        Ok(())
    }

    async fn handle_scan(&self, input: &str) {
        let mut session = self.state.session.lock().await;
        match session.handle_scan(input).await {
            Ok(Some(event)) => {
                tracing::debug!(kind = %event.kind, code = %event.code, "Logged event");
            }
            Ok(None) => {}
            // Feedback already told the operator about rule violations; an
            // error here means the store itself failed.
            Err(e) => {
                println!("!! {e}");
                tracing::error!(error = %e, "Scan not recorded");
            }
        }
    }

    /// Returns false when the loop should stop
    async fn handle_command(&self, input: &str) -> bool {
        let (command, arg) = match input.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (input, ""),
        };

        if matches!(command, "quit" | "q") {
            return false;
        }
        if let Err(e) = self.dispatch(command, arg).await {
            println!("!! {e}");
            tracing::error!(command, error = %e, "Command failed");
        }
        true
    }

    async fn dispatch(&self, command: &str, arg: &str) -> AppResult<()> {
        match command {
            "sync" => self.force_sync().await,
            "resend" => self.resend_today().await,
            "export" => self.export_day(arg),
            "status" => self.print_status().await,
            "operator" => self.set_operator(arg).await,
            "url" => self.show_or_set_url(arg),
            "plain" => self.show_or_set_plain(arg),
            "help" => {
                print_help();
                Ok(())
            }
            _ => {
                println!("Unknown command /{command}; /help lists them.");
                Ok(())
            }
        }
    }

    async fn force_sync(&self) -> AppResult<()> {
        print_outcome(self.state.engine.sync_now().await);
        Ok(())
    }

    /// Clear today's synced flags and push again; the collector drops the
    /// duplicates
    async fn resend_today(&self) -> AppResult<()> {
        let today = shared::util::today();
        let reset = self.state.events.reset_synced_for_day(&today)?;
        println!("Requeued {reset} events for {today}.");
        print_outcome(self.state.engine.sync_now().await);
        Ok(())
    }

    fn export_day(&self, arg: &str) -> AppResult<()> {
        let day = if arg.is_empty() {
            shared::util::today()
        } else {
            validate_day(arg)?;
            arg.to_string()
        };
        let dir = std::path::PathBuf::from(&self.state.config.data_dir);
        let path = export::export_day(&self.state.events, &dir, &day)?;
        println!("Wrote {}.", path.display());
        Ok(())
    }

    async fn print_status(&self) -> AppResult<()> {
        let (operator, city, open_box, last_closed) = {
            let session = self.state.session.lock().await;
            let state = session.state();
            let open_box = match (state.box_id(), state.client()) {
                (Some(box_id), Some(client)) => {
                    Some((box_id.to_string(), client.to_string(), state.items_in_box()))
                }
                _ => None,
            };
            (
                session.operator().to_string(),
                state.city().unwrap_or("-").to_string(),
                open_box,
                session.last_box_items_count(),
            )
        };

        let box_line = match open_box {
            Some((box_id, client, items)) => {
                // Same per-box check the items indicator runs: ITEM rows of
                // the open box still waiting for the collector.
                let not_sent = self.state.events.pending_items(&box_id)?;
                if not_sent > 0 {
                    format!("{box_id} ({client}), {items} items, {not_sent} not yet sent")
                } else {
                    format!("{box_id} ({client}), {items} items")
                }
            }
            None => "-".to_string(),
        };

        let station = self.state.settings.station()?;
        let pending = self.state.events.unsent()?.len();
        let total = self.state.events.count()?;
        let status = self.state.engine.status();

        println!("Operator  : {}", dash_if_empty(&operator));
        println!("City      : {city}");
        println!("Box       : {box_line}");
        println!("Last box  : {last_closed} items");
        println!("Collector : {}", dash_if_empty(&station.sync_url));
        println!(
            "Mode      : {}",
            if station.send_plain { "plain" } else { "json" }
        );
        println!("Pending   : {pending} unsent of {total} total");
        if let Some(since) = status.first_unsent_ts {
            println!("Queued    : since {}", fmt_millis(since));
        }
        println!("Online    : {}", if status.online { "yes" } else { "no" });
        println!(
            "Last sync : {}",
            status.last_sync.map(fmt_millis).unwrap_or_else(|| "never".to_string())
        );
        if let Some(error) = &status.last_sync_error {
            println!("Last error: {error}");
        }
        Ok(())
    }

    async fn set_operator(&self, arg: &str) -> AppResult<()> {
        if arg.is_empty() {
            return Err(AppError::validation("usage: /operator <name>"));
        }
        self.state.session.lock().await.set_operator(arg)?;
        println!("Operator set to {arg}.");
        Ok(())
    }

    fn show_or_set_url(&self, arg: &str) -> AppResult<()> {
        if arg.is_empty() {
            let station = self.state.settings.station()?;
            println!("Collector URL: {}", dash_if_empty(&station.sync_url));
            return Ok(());
        }
        self.state.settings.put(keys::SYNC_URL, &arg.to_string())?;
        println!("Collector URL set to {arg}.");
        Ok(())
    }

    fn show_or_set_plain(&self, arg: &str) -> AppResult<()> {
        let enabled = match arg {
            "" => {
                let station = self.state.settings.station()?;
                println!(
                    "Plain-text mode is {}.",
                    if station.send_plain { "on" } else { "off" }
                );
                return Ok(());
            }
            "on" => true,
            "off" => false,
            _ => return Err(AppError::validation("usage: /plain [on|off]")),
        };
        self.state.settings.put(keys::SEND_PLAIN, &enabled)?;
        println!("Plain-text mode {}.", if enabled { "on" } else { "off" });
        Ok(())
    }
}

fn print_outcome(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Synced { sent } => println!("Synced {sent} events."),
        SyncOutcome::AlreadySynced => println!("Nothing to sync."),
        SyncOutcome::InFlight => println!("A sync is already running."),
        SyncOutcome::NotConfigured => println!("No collector URL set; use /url <base>."),
        SyncOutcome::Failed { error } => println!("Sync failed: {error}"),
    }
}

fn print_help() {
    println!("/sync              force a sync now");
    println!("/resend            requeue today's events and sync");
    println!("/export [day]      write scanner_log_<day>.csv (default today)");
    println!("/status            session and sync state");
    println!("/operator <name>   set the operator stamped on events");
    println!("/url [base]        show or set the collector URL");
    println!("/plain [on|off]    show or toggle the legacy plain-text wire mode");
    println!("/quit              stop the station");
}

fn dash_if_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn fmt_millis(ms: i64) -> String {
    chrono::Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn validate_day(day: &str) -> AppResult<()> {
    let well_formed = day.len() == 10
        && day.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(AppError::validation(format!(
            "bad day '{day}', expected YYYY-MM-DD"
        )));
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
