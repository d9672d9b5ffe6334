//! Settings table: station configuration and the work-state snapshot
//!
//! Values are stored as JSON under string keys. Key names date back to the
//! first client generation and stay as they are so an upgraded station picks
//! up its old state.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::scan::machine::WorkSnapshot;

use super::StoreResult;

/// Table for settings: key = setting name, value = JSON value
pub(super) const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// Setting keys
pub mod keys {
    pub const SYNC_URL: &str = "syncUrl";
    pub const OPERATOR: &str = "operator";
    pub const SEND_PLAIN: &str = "sendPlain";
    pub const THEME: &str = "theme";

    // Work-state snapshot
    pub const CITY: &str = "city";
    pub const BOX: &str = "box";
    pub const CLIENT: &str = "client";
    pub const ITEMS_IN_BOX: &str = "itemsInBox";
    pub const BOX_START: &str = "boxStart";
}

/// Station settings that survive restarts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationSettings {
    /// Collector base URL; sync refuses to run while this is empty
    pub sync_url: String,
    /// Operator name stamped onto every event
    pub operator: String,
    /// Legacy plain-text wire mode instead of the JSON API
    pub send_plain: bool,
    /// Display theme, kept for the reporting side
    pub theme: String,
}

/// Typed access to the settings table
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get one setting, `None` when absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;

        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Write one setting
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            let encoded = serde_json::to_vec(value)?;
            table.insert(key, encoded.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load the station settings, with defaults for anything unset
    pub fn station(&self) -> StoreResult<StationSettings> {
        Ok(StationSettings {
            sync_url: self.get(keys::SYNC_URL)?.unwrap_or_default(),
            operator: self.get(keys::OPERATOR)?.unwrap_or_default(),
            send_plain: self.get(keys::SEND_PLAIN)?.unwrap_or(false),
            theme: self
                .get(keys::THEME)?
                .unwrap_or_else(|| "dark".to_string()),
        })
    }

    /// Load the persisted work-state snapshot (all-empty when never saved)
    pub fn work_state(&self) -> StoreResult<WorkSnapshot> {
        Ok(WorkSnapshot {
            city: self.get(keys::CITY)?.unwrap_or_default(),
            box_id: self.get(keys::BOX)?.unwrap_or_default(),
            client: self.get(keys::CLIENT)?.unwrap_or_default(),
            items_in_box: self.get(keys::ITEMS_IN_BOX)?.unwrap_or(0),
            box_start: self.get(keys::BOX_START)?.unwrap_or(None),
        })
    }

    /// Mirror the work-state snapshot; called after every accepted transition
    pub fn save_work_state(&self, snapshot: &WorkSnapshot) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            table.insert(keys::CITY, serde_json::to_vec(&snapshot.city)?.as_slice())?;
            table.insert(keys::BOX, serde_json::to_vec(&snapshot.box_id)?.as_slice())?;
            table.insert(
                keys::CLIENT,
                serde_json::to_vec(&snapshot.client)?.as_slice(),
            )?;
            table.insert(
                keys::ITEMS_IN_BOX,
                serde_json::to_vec(&snapshot.items_in_box)?.as_slice(),
            )?;
            table.insert(
                keys::BOX_START,
                serde_json::to_vec(&snapshot.box_start)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_in_memory;

    #[test]
    fn test_get_missing_returns_none() {
        let settings = SettingsStore::new(open_in_memory().unwrap());
        assert_eq!(settings.get::<String>(keys::SYNC_URL).unwrap(), None);
    }

    #[test]
    fn test_station_defaults() {
        let settings = SettingsStore::new(open_in_memory().unwrap());
        let station = settings.station().unwrap();

        assert!(station.sync_url.is_empty());
        assert!(station.operator.is_empty());
        assert!(!station.send_plain);
        assert_eq!(station.theme, "dark");
    }

    #[test]
    fn test_put_then_station_roundtrip() {
        let settings = SettingsStore::new(open_in_memory().unwrap());
        settings
            .put(keys::SYNC_URL, &"https://collector.example".to_string())
            .unwrap();
        settings.put(keys::OPERATOR, &"ivanov".to_string()).unwrap();
        settings.put(keys::SEND_PLAIN, &true).unwrap();

        let station = settings.station().unwrap();
        assert_eq!(station.sync_url, "https://collector.example");
        assert_eq!(station.operator, "ivanov");
        assert!(station.send_plain);
    }

    #[test]
    fn test_work_state_roundtrip() {
        let settings = SettingsStore::new(open_in_memory().unwrap());

        // Never saved: everything empty
        let empty = settings.work_state().unwrap();
        assert_eq!(empty, WorkSnapshot::default());

        let snapshot = WorkSnapshot {
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
            client: "ACME".to_string(),
            items_in_box: 7,
            box_start: Some(1_750_000_000_000),
        };
        settings.save_work_state(&snapshot).unwrap();
        assert_eq!(settings.work_state().unwrap(), snapshot);

        // Clearing writes empties, not deletions
        settings.save_work_state(&WorkSnapshot::default()).unwrap();
        assert_eq!(settings.work_state().unwrap(), WorkSnapshot::default());
    }
}
