//! Scan events - immutable facts recorded for every scan outcome

use serde::{Deserialize, Serialize};

use crate::util::{day_of, now_millis};

/// Origin tag stamped on every event. The collector uses it to tell apart
/// client generations; earlier clients of this lineage reported as `pwa` and
/// the tag is kept for wire compatibility.
pub const EVENT_SOURCE: &str = "pwa";

/// Scan event - immutable audit record
///
/// One row per scan outcome, accepted or rejected. Rows are append-only;
/// the only field ever rewritten afterwards is `synced`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanEvent {
    /// Event unique ID (v4, generated locally, never reused)
    pub uuid: String,
    /// Creation time (Unix milliseconds)
    pub timestamp: i64,
    /// Calendar day of `timestamp` (`YYYY-MM-DD`, local time zone);
    /// secondary index key
    pub day: String,
    /// Operator name at creation time (empty when unset)
    pub operator: String,
    /// Client derived from the open box (empty when unset)
    pub client: String,
    /// Open city at creation time (empty when unset)
    pub city: String,
    /// Open box at creation time (empty when unset)
    #[serde(rename = "box")]
    pub box_id: String,
    /// Raw scanned payload, or the symbolic code of a synthetic event
    /// (error code, closed box id, closed city id)
    pub code: String,
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Origin application tag, always [`EVENT_SOURCE`]
    pub source: String,
    /// Free-text payload (the offending raw code for a Cyrillic error;
    /// empty otherwise)
    pub details: String,
    /// Set true exactly once, after the collector confirmed acceptance
    /// (insert or recognized duplicate). Absent on rows written before the
    /// flag existed, which reads as false.
    #[serde(default)]
    pub synced: bool,
}

/// Event kind enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// City opened (also re-logged when the open city is scanned again)
    City,
    /// City closed by the operator
    CityClose,
    /// Box opened
    Box,
    /// Box closed by the operator
    Close,
    /// Box closed by the inactivity timer
    AutoClose,
    /// Item accepted into the open box
    Item,
    /// Rejected scan; `code` carries the [`ErrorCode`]
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::City => write!(f, "CITY"),
            EventKind::CityClose => write!(f, "CITY_CLOSE"),
            EventKind::Box => write!(f, "BOX"),
            EventKind::Close => write!(f, "CLOSE"),
            EventKind::AutoClose => write!(f, "AUTO_CLOSE"),
            EventKind::Item => write!(f, "ITEM"),
            EventKind::Error => write!(f, "ERROR"),
        }
    }
}

/// Rule violated by a rejected scan, recorded in the `code` field of an
/// `ERROR` event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Box or item scan without an open city, or CITY:CLOSE with none open
    NoCity,
    /// Item scan without an open box
    NoBox,
    /// Close/open attempt while a different box is still open
    BoxNotClosed,
    /// City-open attempt while a different city is still open
    CityNotClosed,
    /// Scanned payload contains Cyrillic characters (wrong keyboard layout
    /// or mangled QR content)
    CyrillicError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoCity => "NO_CITY",
            ErrorCode::NoBox => "NO_BOX",
            ErrorCode::BoxNotClosed => "BOX_NOT_CLOSED",
            ErrorCode::CityNotClosed => "CITY_NOT_CLOSED",
            ErrorCode::CyrillicError => "CYRILLIC_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session snapshot stamped onto an event at creation time
///
/// Open transitions update the session before building the event (the event
/// carries the new city/box); close transitions build the event before
/// clearing (the event carries what was closed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    pub operator: String,
    pub client: String,
    pub city: String,
    pub box_id: String,
}

impl ScanEvent {
    /// Create a new event stamped with the given session context.
    pub fn new(kind: EventKind, code: impl Into<String>, ctx: &EventContext) -> Self {
        let timestamp = now_millis();
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            timestamp,
            day: day_of(timestamp),
            operator: ctx.operator.clone(),
            client: ctx.client.clone(),
            city: ctx.city.clone(),
            box_id: ctx.box_id.clone(),
            code: code.into(),
            kind,
            source: EVENT_SOURCE.to_string(),
            details: String::new(),
            synced: false,
        }
    }

    /// Create an `ERROR` event for a rejected scan.
    pub fn error(code: ErrorCode, details: impl Into<String>, ctx: &EventContext) -> Self {
        let mut event = Self::new(EventKind::Error, code.as_str(), ctx);
        event.details = details.into();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> EventContext {
        EventContext {
            operator: "ivanov".to_string(),
            client: "ACME".to_string(),
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
        }
    }

    #[test]
    fn test_new_event_snapshots_context() {
        let event = ScanEvent::new(EventKind::Item, "SKU-123", &test_context());

        assert_eq!(event.operator, "ivanov");
        assert_eq!(event.city, "MSK");
        assert_eq!(event.box_id, "ACME/001");
        assert_eq!(event.code, "SKU-123");
        assert_eq!(event.source, EVENT_SOURCE);
        assert_eq!(event.day, day_of(event.timestamp));
        assert!(!event.synced);
        assert!(event.details.is_empty());
    }

    #[test]
    fn test_serialized_field_names_match_wire() {
        let event = ScanEvent::new(EventKind::CityClose, "MSK", &test_context());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CITY_CLOSE");
        assert_eq!(json["box"], "ACME/001");
        assert!(json.get("kind").is_none());
        assert!(json.get("box_id").is_none());
    }

    #[test]
    fn test_error_event_carries_code_and_details() {
        let event = ScanEvent::error(ErrorCode::CyrillicError, "ЯЩИК-1", &test_context());

        assert_eq!(event.kind, EventKind::Error);
        assert_eq!(event.code, "CYRILLIC_ERROR");
        assert_eq!(event.details, "ЯЩИК-1");
    }

    #[test]
    fn test_synced_defaults_false_on_rows_without_the_flag() {
        let json = r#"{"uuid":"u1","timestamp":1,"day":"2025-01-01","operator":"","client":"","city":"","box":"","code":"X","type":"ITEM","source":"pwa","details":""}"#;
        let event: ScanEvent = serde_json::from_str(json).unwrap();
        assert!(!event.synced);
    }

    #[test]
    fn test_kind_display_matches_serde() {
        for kind in [
            EventKind::City,
            EventKind::CityClose,
            EventKind::Box,
            EventKind::Close,
            EventKind::AutoClose,
            EventKind::Item,
            EventKind::Error,
        ] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, kind.to_string());
        }
    }
}
