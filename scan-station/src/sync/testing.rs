//! Test doubles for the sync layer

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{BatchResponse, EventBatch};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sync::{Collector, SyncError, SyncTarget};

/// Scripted in-memory collector
///
/// Pops one prepared result per push; once the script runs dry every push is
/// accepted. `ping_alive` drives the probe answer.
#[derive(Default)]
pub(crate) struct FakeCollector {
    pub(crate) pushes: Mutex<Vec<EventBatch>>,
    pub(crate) script: Mutex<VecDeque<Result<BatchResponse, SyncError>>>,
    pub(crate) ping_alive: AtomicBool,
}

impl FakeCollector {
    pub(crate) fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn scripted(results: Vec<Result<BatchResponse, SyncError>>) -> Arc<Self> {
        let fake = Self::default();
        *fake.script.lock() = results.into();
        Arc::new(fake)
    }

    pub(crate) fn push_count(&self) -> usize {
        self.pushes.lock().len()
    }

    pub(crate) fn last_batch(&self) -> Option<EventBatch> {
        self.pushes.lock().last().cloned()
    }
}

#[async_trait]
impl Collector for FakeCollector {
    async fn push_batch(
        &self,
        _target: &SyncTarget,
        batch: &EventBatch,
    ) -> Result<BatchResponse, SyncError> {
        self.pushes.lock().push(batch.clone());
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(BatchResponse {
                ok: true,
                inserted: batch.events.len() as u32,
                skipped: 0,
                duplicates: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }

    async fn ping(&self, _target: &SyncTarget) -> Result<bool, SyncError> {
        Ok(self.ping_alive.load(Ordering::SeqCst))
    }
}
