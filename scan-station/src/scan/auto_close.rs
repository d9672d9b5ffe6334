//! AutoCloseWorker - closes boxes that were left open

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::scan::ScanSession;

pub struct AutoCloseWorker {
    session: Arc<Mutex<ScanSession>>,
    poll: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
}

impl AutoCloseWorker {
    pub fn new(
        session: Arc<Mutex<ScanSession>>,
        poll: Duration,
        max_age: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            poll,
            max_age,
            shutdown,
        }
    }

    /// Run the auto-close worker
    ///
    /// The first poll fires immediately, which closes a box restored from a
    /// snapshot after the station sat powered off past the age limit.
    pub async fn run(self) {
        tracing::info!(
            max_age_mins = self.max_age.as_secs() / 60,
            "AutoCloseWorker started"
        );

        let mut poll = tokio::time::interval(self.poll);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("AutoCloseWorker shutting down");
                    break;
                }

                _ = poll.tick() => {
                    let mut session = self.session.lock().await;
                    match session.auto_close_expired(self.max_age) {
                        Ok(Some(event)) => {
                            tracing::info!(box_id = %event.box_id, "Box auto-closed after inactivity");
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!("Auto-close check failed: {e}"),
                    }
                }
            }
        }

        tracing::info!("AutoCloseWorker stopped");
    }
}
