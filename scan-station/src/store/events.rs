//! Event log backed by redb
//!
//! Events are keyed by uuid; a `(day, uuid)` table gives the day-scoped read
//! path. Rows are serialized as JSON so the on-disk shape matches the wire
//! and CSV field names.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use shared::{EventKind, ScanEvent};

use super::{StoreError, StoreResult};

/// Table for storing events: key = uuid, value = JSON-serialized ScanEvent
pub(super) const EVENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// Day index: key = (day, uuid), value = empty (existence check)
pub(super) const DAY_INDEX_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("events_by_day");

/// Scan event log backed by redb
#[derive(Clone)]
pub struct EventStore {
    db: Arc<Database>,
}

impl EventStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // ========== Write Path ==========

    /// Append a new event
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the uuid already exists;
    /// ids are generated locally and a collision means something upstream
    /// went badly wrong, so nothing is overwritten.
    pub fn append(&self, event: &ScanEvent) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut events_table = txn.open_table(EVENTS_TABLE)?;
            if events_table.get(event.uuid.as_str())?.is_some() {
                return Err(StoreError::DuplicateKey(event.uuid.clone()));
            }
            let value = serde_json::to_vec(event)?;
            events_table.insert(event.uuid.as_str(), value.as_slice())?;

            let mut index = txn.open_table(DAY_INDEX_TABLE)?;
            index.insert((event.day.as_str(), event.uuid.as_str()), ())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Write an event by uuid regardless of presence
    ///
    /// Only used to flip `synced` (and to reset it on resend), but writes the
    /// whole row; the day index entry is kept in step.
    pub fn upsert(&self, event: &ScanEvent) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut events_table = txn.open_table(EVENTS_TABLE)?;
            let value = serde_json::to_vec(event)?;
            events_table.insert(event.uuid.as_str(), value.as_slice())?;

            let mut index = txn.open_table(DAY_INDEX_TABLE)?;
            index.insert((event.day.as_str(), event.uuid.as_str()), ())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Flip `synced` back to false for every event of the given day
    ///
    /// Administrative "resend today". Returns how many rows changed.
    pub fn reset_synced_for_day(&self, day: &str) -> StoreResult<usize> {
        let txn = self.db.begin_write()?;
        let mut changed = 0;
        {
            let mut events_table = txn.open_table(EVENTS_TABLE)?;

            let mut rewrites: Vec<(String, Vec<u8>)> = Vec::new();
            for result in events_table.iter()? {
                let (key, value) = result?;
                let mut event: ScanEvent = serde_json::from_slice(value.value())?;
                if event.day == day && event.synced {
                    event.synced = false;
                    rewrites.push((key.value().to_string(), serde_json::to_vec(&event)?));
                }
            }

            for (uuid, value) in rewrites {
                events_table.insert(uuid.as_str(), value.as_slice())?;
                changed += 1;
            }
        }
        txn.commit()?;
        Ok(changed)
    }

    // ========== Read Path ==========

    /// Get an event by uuid
    pub fn get(&self, uuid: &str) -> StoreResult<Option<ScanEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        match table.get(uuid)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get every stored event, in key (uuid) order
    ///
    /// Order is an implementation detail; callers re-sort by timestamp when
    /// chronology matters.
    pub fn list_all(&self) -> StoreResult<Vec<ScanEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            events.push(serde_json::from_slice(value.value())?);
        }
        Ok(events)
    }

    /// Get every event of a calendar day
    ///
    /// Served from the day index; if the index cannot be read the call falls
    /// back to a full scan filtered in memory, with identical membership.
    /// Callers cannot tell the two paths apart.
    pub fn list_by_day(&self, day: &str) -> StoreResult<Vec<ScanEvent>> {
        match self.list_by_day_indexed(day) {
            Ok(events) => Ok(events),
            Err(error) => {
                tracing::warn!(day, %error, "day index unavailable, falling back to full scan");
                let mut events = self.list_all()?;
                events.retain(|event| event.day == day);
                Ok(events)
            }
        }
    }

    fn list_by_day_indexed(&self, day: &str) -> StoreResult<Vec<ScanEvent>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DAY_INDEX_TABLE)?;
        let events_table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        for result in index.range((day, "")..)? {
            let (key, _value) = result?;
            let (entry_day, uuid) = key.value();
            if entry_day != day {
                break;
            }
            match events_table.get(uuid)? {
                Some(value) => events.push(serde_json::from_slice(value.value())?),
                None => return Err(StoreError::IndexEntryMissing(uuid.to_string())),
            }
        }
        Ok(events)
    }

    /// Get every event not yet confirmed by the collector
    pub fn unsent(&self) -> StoreResult<Vec<ScanEvent>> {
        let mut events = self.list_all()?;
        events.retain(|event| !event.synced);
        Ok(events)
    }

    /// Count unsent `ITEM` events of the given box (items indicator)
    pub fn pending_items(&self, box_id: &str) -> StoreResult<usize> {
        let events = self.list_all()?;
        Ok(events
            .iter()
            .filter(|event| {
                event.kind == EventKind::Item && event.box_id == box_id && !event.synced
            })
            .count())
    }

    /// Get the `n` most recent events by timestamp, oldest first
    ///
    /// Key order says nothing about recency, so this re-sorts; used for the
    /// stale-box lookback.
    pub fn tail(&self, n: usize) -> StoreResult<Vec<ScanEvent>> {
        let mut events = self.list_all()?;
        events.sort_by_key(|event| event.timestamp);
        let skip = events.len().saturating_sub(n);
        Ok(events.split_off(skip))
    }

    /// Total number of stored events
    pub fn count(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;
        Ok(table.len()?)
    }
}
