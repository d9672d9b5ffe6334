//! SyncWorker - owns the debounce and periodic sync timers

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::sync::SyncEngine;

/// Scheduling requests from the scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// (Re)arm the debounce timer
    Debounce,
    /// Drop any armed debounce; an immediate sync already ran
    CancelDebounce,
}

/// Sending half handed to the scan session
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncTrigger>,
}

impl SyncHandle {
    pub fn debounce(&self) {
        let _ = self.tx.send(SyncTrigger::Debounce);
    }

    pub fn cancel_debounce(&self) {
        let _ = self.tx.send(SyncTrigger::CancelDebounce);
    }
}

pub struct SyncWorker {
    engine: Arc<SyncEngine>,
    rx: mpsc::UnboundedReceiver<SyncTrigger>,
    debounce: Duration,
    periodic: Duration,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        engine: Arc<SyncEngine>,
        debounce: Duration,
        periodic: Duration,
        shutdown: CancellationToken,
    ) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                engine,
                rx,
                debounce,
                periodic,
                shutdown,
            },
            SyncHandle { tx },
        )
    }

    /// Run the sync worker
    ///
    /// 1. Periodic tick: sync when online, otherwise ping-probe and sync on
    ///    recovery. The first tick fires immediately, so the station learns
    ///    its connectivity right at startup.
    /// 2. Debounce triggers from the session arm or drop a deadline.
    /// 3. Elapsed deadline: sync if online; the periodic tick covers the
    ///    offline case later.
    pub async fn run(mut self) {
        tracing::info!("SyncWorker started");

        let mut periodic = tokio::time::interval(self.periodic);
        let mut debounce_deadline: Option<Instant> = None;

        loop {
            let sleep_until =
                debounce_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("SyncWorker shutting down");
                    break;
                }

                _ = tokio::time::sleep_until(sleep_until), if debounce_deadline.is_some() => {
                    debounce_deadline = None;
                    if self.engine.is_online() {
                        let _ = self.engine.sync_now().await;
                    }
                }

                _ = periodic.tick() => {
                    if self.engine.is_online() {
                        let _ = self.engine.sync_now().await;
                    } else if self.engine.probe().await {
                        let _ = self.engine.sync_now().await;
                    }
                }

                trigger = self.rx.recv() => {
                    match trigger {
                        Some(SyncTrigger::Debounce) => {
                            debounce_deadline = Some(Instant::now() + self.debounce);
                        }
                        Some(SyncTrigger::CancelDebounce) => {
                            debounce_deadline = None;
                        }
                        None => {
                            tracing::info!("Trigger channel closed, SyncWorker stopping");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("SyncWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EventContext, EventKind, ScanEvent};
    use std::sync::atomic::Ordering;

    use crate::store::{keys, open_in_memory, EventStore, SettingsStore};
    use crate::sync::testing::FakeCollector;
    use crate::sync::SharedSyncStatus;

    fn setup(
        collector: Arc<FakeCollector>,
        periodic: Duration,
    ) -> (SyncHandle, EventStore, SharedSyncStatus, CancellationToken) {
        let db = open_in_memory().unwrap();
        let events = EventStore::new(db.clone());
        let settings = SettingsStore::new(db);
        settings
            .put(keys::SYNC_URL, &"http://collector.test".to_string())
            .unwrap();
        let status = SharedSyncStatus::default();
        let engine = Arc::new(SyncEngine::new(
            events.clone(),
            settings,
            collector,
            String::new(),
            20,
            status.clone(),
        ));
        let shutdown = CancellationToken::new();
        let (worker, handle) = SyncWorker::new(
            engine,
            Duration::from_millis(1000),
            periodic,
            shutdown.clone(),
        );
        tokio::spawn(worker.run());
        (handle, events, status, shutdown)
    }

    fn seed_event(store: &EventStore) {
        let ctx = EventContext {
            operator: "ivanov".to_string(),
            client: "ACME".to_string(),
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
        };
        store
            .append(&ScanEvent::new(EventKind::Item, "SKU-1", &ctx))
            .unwrap();
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_after_quiet_period() {
        let collector = FakeCollector::accepting();
        let (handle, events, status, _shutdown) =
            setup(collector.clone(), Duration::from_secs(3600));
        status.write().online = true;
        settle().await; // startup tick with nothing unsent

        seed_event(&events);
        handle.debounce();
        settle().await;

        tokio::time::advance(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(collector.push_count(), 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(collector.push_count(), 1);
        assert!(events.unsent().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_extends_debounce_window() {
        let collector = FakeCollector::accepting();
        let (handle, events, status, _shutdown) =
            setup(collector.clone(), Duration::from_secs(3600));
        status.write().online = true;
        settle().await;

        seed_event(&events);
        handle.debounce();
        settle().await;
        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;

        handle.debounce();
        settle().await;
        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(collector.push_count(), 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(collector.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_debounce() {
        let collector = FakeCollector::accepting();
        let (handle, events, status, _shutdown) =
            setup(collector.clone(), Duration::from_secs(3600));
        status.write().online = true;
        settle().await;

        seed_event(&events);
        handle.debounce();
        settle().await;
        handle.cancel_debounce();
        settle().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(collector.push_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_probe_recovers_and_syncs() {
        let collector = FakeCollector::accepting();
        collector.ping_alive.store(true, Ordering::SeqCst);

        let db = open_in_memory().unwrap();
        let events = EventStore::new(db.clone());
        let settings = SettingsStore::new(db);
        settings
            .put(keys::SYNC_URL, &"http://collector.test".to_string())
            .unwrap();
        seed_event(&events);

        let status = SharedSyncStatus::default();
        let engine = Arc::new(SyncEngine::new(
            events.clone(),
            settings,
            collector.clone(),
            String::new(),
            20,
            status.clone(),
        ));
        let shutdown = CancellationToken::new();
        let (worker, _handle) = SyncWorker::new(
            engine,
            Duration::from_millis(1000),
            Duration::from_secs(10),
            shutdown,
        );
        tokio::spawn(worker.run());

        // Startup tick: offline, so the worker probes, recovers, and syncs.
        settle().await;
        assert!(status.read().online);
        assert_eq!(collector.push_count(), 1);
        assert!(events.unsent().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_skipped_while_offline() {
        let collector = FakeCollector::accepting();
        let (handle, events, _status, _shutdown) =
            setup(collector.clone(), Duration::from_secs(3600));
        settle().await;

        seed_event(&events);
        handle.debounce();
        settle().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;

        assert_eq!(collector.push_count(), 0);
        assert_eq!(events.unsent().unwrap().len(), 1);
    }
}
