//! Collector batch protocol types
//!
//! Used by the station to push unsent scan events to the remote collector
//! and to decode its verdict.

use serde::{Deserialize, Serialize};

use crate::event::ScanEvent;

/// A batch of unsent events pushed to the collector
///
/// The collector rejects batches above 100 events; the station's own batch
/// cap stays well below that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<WireEvent>,
}

impl EventBatch {
    pub fn new(events: &[ScanEvent]) -> Self {
        Self {
            events: events.iter().map(WireEvent::from).collect(),
        }
    }
}

/// Wire form of one event
///
/// Field names are fixed by the collector API: `ts` instead of `timestamp`,
/// and the local `day`/`synced` bookkeeping never leaves the station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub uuid: String,
    /// Creation time (Unix milliseconds)
    pub ts: i64,
    /// Event kind as its wire string (`CITY`, `ITEM`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    pub operator: String,
    pub client: String,
    pub city: String,
    #[serde(rename = "box")]
    pub box_id: String,
    pub code: String,
    pub source: String,
    pub details: String,
}

impl From<&ScanEvent> for WireEvent {
    fn from(event: &ScanEvent) -> Self {
        Self {
            uuid: event.uuid.clone(),
            ts: event.timestamp,
            kind: event.kind.to_string(),
            operator: event.operator.clone(),
            client: event.client.clone(),
            city: event.city.clone(),
            box_id: event.box_id.clone(),
            code: event.code.clone(),
            source: event.source.clone(),
            details: event.details.clone(),
        }
    }
}

/// Collector verdict for a pushed batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Overall verdict; false means nothing in the batch may be marked synced
    pub ok: bool,
    /// Rows newly inserted
    #[serde(default)]
    pub inserted: u32,
    /// Rows skipped as already known
    #[serde(default)]
    pub skipped: u32,
    /// Uuids the collector recognized as duplicates; these count as accepted
    #[serde(default)]
    pub duplicates: Vec<String>,
    /// Error messages when `ok` is false
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Reply of the collector liveness probe (`GET /ping`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventContext, EventKind};

    #[test]
    fn test_wire_event_field_names() {
        let ctx = EventContext {
            operator: "ivanov".to_string(),
            client: "ACME".to_string(),
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
        };
        let event = ScanEvent::new(EventKind::Item, "SKU-1", &ctx);
        let batch = EventBatch::new(std::slice::from_ref(&event));
        let json = serde_json::to_value(&batch).unwrap();

        let wire = &json["events"][0];
        assert_eq!(wire["uuid"], event.uuid.as_str());
        assert_eq!(wire["ts"], event.timestamp);
        assert_eq!(wire["type"], "ITEM");
        assert_eq!(wire["box"], "ACME/001");
        assert_eq!(wire["source"], "pwa");
        assert!(wire.get("timestamp").is_none());
        assert!(wire.get("day").is_none());
        assert!(wire.get("synced").is_none());
    }

    #[test]
    fn test_batch_response_accepts_sparse_body() {
        let response: BatchResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(response.ok);
        assert_eq!(response.inserted, 0);
        assert!(response.duplicates.is_empty());
        assert!(response.errors.is_empty());

        let response: BatchResponse = serde_json::from_str(
            r#"{"ok":false,"inserted":0,"skipped":0,"errors":["bad ts"]}"#,
        )
        .unwrap();
        assert!(!response.ok);
        assert_eq!(response.errors, vec!["bad ts".to_string()]);
    }
}
