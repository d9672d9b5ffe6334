//! SyncEngine - drains unsent events to the collector and marks them sent

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use shared::{BatchResponse, EventBatch, ScanEvent};
use tokio::time::Duration;

use crate::store::{EventStore, SettingsStore, StoreError};
use crate::sync::{Collector, SyncTarget};

/// Attempts per batch before giving up until the next trigger
const MAX_SYNC_RETRIES: u32 = 3;
/// Fixed delay between retry attempts
const RETRY_DELAY_SECS: u64 = 2;

/// Errors from one sync attempt
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Collector unreachable (connect failure, timeout, DNS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Collector answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Credential rejected; retrying cannot help
    #[error("Authorization failed: HTTP {0}")]
    Unauthorized(u16),

    /// Collector answered 2xx but reported `ok: false`
    #[error("Collector rejected batch: {0}")]
    Rejected(String),

    /// Collector answered 2xx with an undecodable body
    #[error("Invalid collector response: {0}")]
    InvalidResponse(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Worth another attempt after a short delay
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// The collector could not be reached at all
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

/// What a `sync_now` call did
#[derive(Debug)]
pub enum SyncOutcome {
    /// Batch delivered; `sent` events are now marked synced
    Synced { sent: usize },
    /// Nothing unsent
    AlreadySynced,
    /// Another sync is running; this call was a no-op
    InFlight,
    /// No collector URL configured
    NotConfigured,
    /// All attempts failed; the batch stays unsent
    Failed { error: SyncError },
}

/// Connectivity and sync bookkeeping shared with the console and workers
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Last probe or push reached the collector
    pub online: bool,
    /// Completion time of the last successful push (Unix milliseconds)
    pub last_sync: Option<i64>,
    /// Message of the last failed push, cleared on success
    pub last_sync_error: Option<String>,
    /// Timestamp of the oldest event logged since the last successful push
    pub first_unsent_ts: Option<i64>,
}

pub type SharedSyncStatus = Arc<RwLock<SyncStatus>>;

/// Drains unsent events to the collector
///
/// Holds the in-flight guard: any number of triggers may call [`sync_now`]
/// concurrently, at most one attempt runs at a time.
///
/// [`sync_now`]: SyncEngine::sync_now
pub struct SyncEngine {
    events: EventStore,
    settings: SettingsStore,
    collector: Arc<dyn Collector>,
    api_key: String,
    batch_cap: usize,
    in_flight: AtomicBool,
    status: SharedSyncStatus,
}

impl SyncEngine {
    pub fn new(
        events: EventStore,
        settings: SettingsStore,
        collector: Arc<dyn Collector>,
        api_key: String,
        batch_cap: usize,
        status: SharedSyncStatus,
    ) -> Self {
        Self {
            events,
            settings,
            collector,
            api_key,
            batch_cap: batch_cap.max(1),
            in_flight: AtomicBool::new(false),
            status,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    pub fn is_online(&self) -> bool {
        self.status.read().online
    }

    /// Record a freshly logged event for the unsent watermark
    pub fn note_unsent(&self, timestamp: i64) {
        let mut status = self.status.write();
        if status.first_unsent_ts.is_none() {
            status.first_unsent_ts = Some(timestamp);
        }
    }

    /// Push one batch of unsent events
    ///
    /// Safe to call from any trigger at any time; overlapping calls return
    /// [`SyncOutcome::InFlight`] without touching the network.
    pub async fn sync_now(&self) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SyncOutcome::InFlight;
        }

        let outcome = self.sync_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);

        match &outcome {
            SyncOutcome::Synced { sent } => tracing::info!(sent, "Sync complete"),
            SyncOutcome::Failed { error } => tracing::warn!("Sync failed: {error}"),
            _ => {}
        }
        outcome
    }

    /// Probe the collector and update the online flag
    pub async fn probe(&self) -> bool {
        let target = match self.target() {
            Ok(Some(target)) => target,
            _ => return false,
        };
        let alive = self.collector.ping(&target).await.unwrap_or(false);
        let was_online = {
            let mut status = self.status.write();
            let was = status.online;
            status.online = alive;
            was
        };
        if alive && !was_online {
            tracing::info!("Collector reachable again");
        }
        alive
    }

    async fn sync_inner(&self) -> SyncOutcome {
        let target = match self.target() {
            Ok(Some(target)) => target,
            Ok(None) => return SyncOutcome::NotConfigured,
            Err(error) => {
                return self.fail(error.into());
            }
        };

        let batch_events = match self.next_batch() {
            Ok(events) => events,
            Err(error) => return self.fail(error.into()),
        };
        if batch_events.is_empty() {
            return SyncOutcome::AlreadySynced;
        }

        let batch = EventBatch::new(&batch_events);
        match self.push_with_retry(&target, &batch).await {
            Ok(verdict) => {
                // The collector has the rows now; if marking fails locally the
                // next round resends them and the server-side dedup absorbs it.
                if let Err(error) = self.mark_synced(&batch_events) {
                    return self.fail(error.into());
                }
                tracing::debug!(
                    inserted = verdict.inserted,
                    skipped = verdict.skipped,
                    duplicates = verdict.duplicates.len(),
                    "Collector accepted batch"
                );
                let mut status = self.status.write();
                status.online = true;
                status.last_sync = Some(shared::util::now_millis());
                status.last_sync_error = None;
                status.first_unsent_ts = None;
                drop(status);
                SyncOutcome::Synced {
                    sent: batch_events.len(),
                }
            }
            Err(error) => self.fail(error),
        }
    }

    fn fail(&self, error: SyncError) -> SyncOutcome {
        let mut status = self.status.write();
        if error.is_offline() {
            status.online = false;
        }
        status.last_sync_error = Some(error.to_string());
        drop(status);
        SyncOutcome::Failed { error }
    }

    /// Current push target, read fresh so settings edits apply immediately
    fn target(&self) -> Result<Option<SyncTarget>, StoreError> {
        let station = self.settings.station()?;
        if station.sync_url.is_empty() {
            return Ok(None);
        }
        Ok(Some(SyncTarget {
            base_url: station.sync_url,
            api_key: self.api_key.clone(),
            send_plain: station.send_plain,
        }))
    }

    /// Oldest unsent events first, capped; the rest wait for the next round
    fn next_batch(&self) -> Result<Vec<ScanEvent>, StoreError> {
        let mut unsent = self.events.unsent()?;
        unsent.sort_by_key(|event| event.timestamp);
        unsent.truncate(self.batch_cap);
        Ok(unsent)
    }

    fn mark_synced(&self, batch: &[ScanEvent]) -> Result<(), StoreError> {
        for event in batch {
            let mut sent = event.clone();
            sent.synced = true;
            self.events.upsert(&sent)?;
        }
        Ok(())
    }

    async fn push_with_retry(
        &self,
        target: &SyncTarget,
        batch: &EventBatch,
    ) -> Result<BatchResponse, SyncError> {
        let delay = Duration::from_secs(RETRY_DELAY_SECS);

        for attempt in 0..MAX_SYNC_RETRIES {
            match self.collector.push_batch(target, batch).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if e.is_transient() && attempt + 1 < MAX_SYNC_RETRIES => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_SYNC_RETRIES,
                        delay_secs = delay.as_secs(),
                        "Push attempt failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EventContext, EventKind};

    use crate::store::{keys, open_in_memory};
    use crate::sync::testing::FakeCollector;

    fn engine_with(
        collector: Arc<FakeCollector>,
        batch_cap: usize,
    ) -> (Arc<SyncEngine>, EventStore, SharedSyncStatus) {
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
            "key-1".to_string(),
            batch_cap,
            status.clone(),
        ));
        (engine, events, status)
    }

    fn seed_events(store: &EventStore, n: usize) -> Vec<ScanEvent> {
        let ctx = EventContext {
            operator: "ivanov".to_string(),
            client: "ACME".to_string(),
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
        };
        (0..n)
            .map(|i| {
                let mut event = ScanEvent::new(EventKind::Item, &format!("SKU-{i}"), &ctx);
                event.timestamp = 1_000 + i as i64;
                store.append(&event).unwrap();
                event
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sync_marks_batch_and_updates_status() {
        let collector = FakeCollector::accepting();
        let (engine, events, status) = engine_with(collector.clone(), 20);
        seed_events(&events, 3);
        engine.note_unsent(1_000);

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Synced { sent: 3 }));
        assert_eq!(collector.push_count(), 1);
        assert!(events.unsent().unwrap().is_empty());

        let status = status.read();
        assert!(status.online);
        assert!(status.last_sync.is_some());
        assert!(status.last_sync_error.is_none());
        assert!(status.first_unsent_ts.is_none());
    }

    #[tokio::test]
    async fn test_sync_without_url_is_not_configured() {
        let collector = FakeCollector::accepting();
        let db = open_in_memory().unwrap();
        let events = EventStore::new(db.clone());
        let settings = SettingsStore::new(db);
        let engine = SyncEngine::new(
            events.clone(),
            settings,
            collector.clone(),
            String::new(),
            20,
            SharedSyncStatus::default(),
        );
        seed_events(&events, 1);

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::NotConfigured));
        assert_eq!(collector.push_count(), 0);
        assert_eq!(events.unsent().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_with_nothing_unsent() {
        let collector = FakeCollector::accepting();
        let (engine, _events, _status) = engine_with(collector.clone(), 20);

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::AlreadySynced));
        assert_eq!(collector.push_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_capped_to_oldest_events() {
        let collector = FakeCollector::accepting();
        let (engine, events, _status) = engine_with(collector.clone(), 2);
        let seeded = seed_events(&events, 5);

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Synced { sent: 2 }));

        let batch = collector.last_batch().unwrap();
        let sent: Vec<&str> = batch.events.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(sent, vec![seeded[0].uuid.as_str(), seeded[1].uuid.as_str()]);
        assert_eq!(events.unsent().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_then_gives_up() {
        let collector = FakeCollector::scripted(vec![
            Err(SyncError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
            Err(SyncError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
            Err(SyncError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
        ]);
        let (engine, events, status) = engine_with(collector.clone(), 20);
        seed_events(&events, 2);
        status.write().online = true;

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        assert_eq!(collector.push_count(), 3);
        assert_eq!(events.unsent().unwrap().len(), 2);

        let status = status.read();
        // A 5xx means the collector was reached, so the station stays online.
        assert!(status.online);
        assert!(status.last_sync_error.is_some());
    }

    #[tokio::test]
    async fn test_unauthorized_fails_without_retry() {
        let collector = FakeCollector::scripted(vec![Err(SyncError::Unauthorized(403))]);
        let (engine, events, _status) = engine_with(collector.clone(), 20);
        seed_events(&events, 1);

        let outcome = engine.sync_now().await;
        assert!(matches!(
            outcome,
            SyncOutcome::Failed {
                error: SyncError::Unauthorized(403)
            }
        ));
        assert_eq!(collector.push_count(), 1);
        assert_eq!(events.unsent().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_batch_stays_unsent() {
        let collector =
            FakeCollector::scripted(vec![Err(SyncError::Rejected("bad ts".to_string()))]);
        let (engine, events, _status) = engine_with(collector.clone(), 20);
        seed_events(&events, 2);

        let outcome = engine.sync_now().await;
        assert!(matches!(
            outcome,
            SyncOutcome::Failed {
                error: SyncError::Rejected(_)
            }
        ));
        // ok:false is permanent for this round, and nothing may be marked sent.
        assert_eq!(collector.push_count(), 1);
        assert_eq!(events.unsent().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_marks_offline() {
        let collector = FakeCollector::scripted(vec![
            Err(SyncError::Transport("connection refused".to_string())),
            Err(SyncError::Transport("connection refused".to_string())),
            Err(SyncError::Transport("connection refused".to_string())),
        ]);
        let (engine, events, status) = engine_with(collector.clone(), 20);
        seed_events(&events, 1);
        status.write().online = true;

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        assert!(!status.read().online);
        assert_eq!(events.unsent().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_guard_skips_overlapping_call() {
        let collector = FakeCollector::accepting();
        let (engine, events, _status) = engine_with(collector.clone(), 20);
        seed_events(&events, 1);

        engine.in_flight.store(true, Ordering::SeqCst);
        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::InFlight));
        assert_eq!(collector.push_count(), 0);

        engine.in_flight.store(false, Ordering::SeqCst);
        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Synced { sent: 1 }));
    }

    #[tokio::test]
    async fn test_duplicates_count_as_accepted() {
        let db = open_in_memory().unwrap();
        let events = EventStore::new(db.clone());
        let settings = SettingsStore::new(db);
        settings
            .put(keys::SYNC_URL, &"http://collector.test".to_string())
            .unwrap();
        let seeded = seed_events(&events, 1);

        let collector = FakeCollector::scripted(vec![Ok(BatchResponse {
            ok: true,
            inserted: 0,
            skipped: 1,
            duplicates: vec![seeded[0].uuid.clone()],
            errors: Vec::new(),
        })]);
        let engine = SyncEngine::new(
            events.clone(),
            settings,
            collector,
            "key-1".to_string(),
            20,
            SharedSyncStatus::default(),
        );

        let outcome = engine.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Synced { sent: 1 }));
        assert!(events.unsent().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_flips_online_flag() {
        let collector = FakeCollector::accepting();
        let (engine, _events, status) = engine_with(collector.clone(), 20);

        assert!(!engine.probe().await);
        assert!(!status.read().online);

        collector.ping_alive.store(true, Ordering::SeqCst);
        assert!(engine.probe().await);
        assert!(status.read().online);
    }
}
