use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::config::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::feedback::Feedback;
use crate::scan::{AutoCloseWorker, ScanSession};
use crate::store::{keys, open_database, EventStore, SettingsStore};
use crate::sync::{
    CollectorService, SharedSyncStatus, SyncEngine, SyncHandle, SyncWorker,
};
use crate::utils::AppResult;

/// Station state, one instance per process
///
/// Holds shared handles to every component the console loop touches. Cloning
/// is shallow; the stores share one redb database underneath.
///
/// # Components
///
/// | Field | Type | Purpose |
/// |-------|------|---------|
/// | config | Config | Boot-time configuration (immutable) |
/// | events | EventStore | Durable scan log |
/// | settings | SettingsStore | Persisted settings + work-state snapshot |
/// | engine | Arc<SyncEngine> | Batch upload and connectivity state |
/// | sync | SyncHandle | Debounce channel into the sync worker |
/// | session | Arc<Mutex<ScanSession>> | The scan state machine with its side effects |
#[derive(Clone)]
pub struct StationState {
    pub config: Config,
    pub events: EventStore,
    pub settings: SettingsStore,
    pub engine: Arc<SyncEngine>,
    pub sync: SyncHandle,
    pub session: Arc<Mutex<ScanSession>>,
}

impl StationState {
    /// Initialize the station and start its background workers
    ///
    /// Boot order:
    /// 1. Data directory and database (`data_dir/scan-station.redb`)
    /// 2. Settings seeded from the environment, first run only
    /// 3. Sync engine + sync worker (debounced and periodic uploads)
    /// 4. Scan session restored from the persisted snapshot
    /// 5. Auto-close worker for stale boxes
    ///
    /// Returns the state plus the task registry; the caller drives shutdown
    /// through the registry.
    pub async fn initialize(
        config: &Config,
        feedback: Arc<dyn Feedback>,
    ) -> AppResult<(Self, BackgroundTasks)> {
        // 1. Database
        std::fs::create_dir_all(&config.data_dir)?;
        let db = open_database(config.db_path())?;
        let events = EventStore::new(db.clone());
        let settings = SettingsStore::new(db);

        // 2. First-run seeding. Persisted values always win afterwards, so a
        // station keeps console edits across restarts even when the
        // environment still carries the old value.
        if let Some(url) = &config.sync_url {
            if settings.get::<String>(keys::SYNC_URL)?.is_none() {
                settings.put(keys::SYNC_URL, url)?;
                tracing::info!(url = %url, "Seeded collector URL from environment");
            }
        }
        if let Some(operator) = &config.operator {
            if settings.get::<String>(keys::OPERATOR)?.is_none() {
                settings.put(keys::OPERATOR, operator)?;
            }
        }

        // 3. Sync engine and worker
        let status = SharedSyncStatus::default();
        let collector = Arc::new(CollectorService::new()?);
        let engine = Arc::new(SyncEngine::new(
            events.clone(),
            settings.clone(),
            collector,
            config.api_key.clone().unwrap_or_default(),
            config.batch_cap,
            status,
        ));

        let mut tasks = BackgroundTasks::new();
        let (sync_worker, sync) = SyncWorker::new(
            engine.clone(),
            config.debounce(),
            config.periodic(),
            tasks.shutdown_token(),
        );
        tasks.spawn("sync_worker", TaskKind::Worker, sync_worker.run());

        // 4. Scan session
        let session = ScanSession::new(
            events.clone(),
            settings.clone(),
            engine.clone(),
            sync.clone(),
            feedback,
        )?;
        let session = Arc::new(Mutex::new(session));

        // 5. Auto-close worker
        let auto_close = AutoCloseWorker::new(
            session.clone(),
            config.auto_close_poll(),
            config.auto_close_after(),
            tasks.shutdown_token(),
        );
        tasks.spawn("auto_close", TaskKind::Periodic, auto_close.run());

        tasks.log_summary();

        let state = Self {
            config: config.clone(),
            events,
            settings,
            engine,
            sync,
            session,
        };
        Ok((state, tasks))
    }
}
