//! Scan state machine
//!
//! The legal transition order (city before box, box before items, closes in
//! reverse) lives here as a pure decision table over an explicit state type.
//! `step` decides what a scan means, `apply` produces the next state;
//! neither touches storage, timers or feedback, so the whole table is
//! testable without I/O. The session layer owns the side effects.

use serde::{Deserialize, Serialize};
use shared::ErrorCode;

use super::code::ScanCode;

/// Session work state. The shape makes "box without city" unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkState {
    #[default]
    Idle,
    CityOpen {
        city: String,
    },
    BoxOpen {
        city: String,
        box_id: String,
        client: String,
        items_in_box: u32,
        /// When the box was opened (Unix ms); drives the inactivity close
        box_start: i64,
    },
}

/// Flat persisted form of [`WorkState`], one settings key per field.
/// Empty strings mean "unset", matching what earlier clients wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSnapshot {
    pub city: String,
    pub box_id: String,
    pub client: String,
    pub items_in_box: u32,
    pub box_start: Option<i64>,
}

impl WorkState {
    pub fn city(&self) -> Option<&str> {
        match self {
            WorkState::Idle => None,
            WorkState::CityOpen { city } | WorkState::BoxOpen { city, .. } => Some(city),
        }
    }

    pub fn box_id(&self) -> Option<&str> {
        match self {
            WorkState::BoxOpen { box_id, .. } => Some(box_id),
            _ => None,
        }
    }

    pub fn client(&self) -> Option<&str> {
        match self {
            WorkState::BoxOpen { client, .. } => Some(client),
            _ => None,
        }
    }

    pub fn items_in_box(&self) -> u32 {
        match self {
            WorkState::BoxOpen { items_in_box, .. } => *items_in_box,
            _ => 0,
        }
    }

    pub fn box_start(&self) -> Option<i64> {
        match self {
            WorkState::BoxOpen { box_start, .. } => Some(*box_start),
            _ => None,
        }
    }

    /// Flatten for persistence
    pub fn snapshot(&self) -> WorkSnapshot {
        WorkSnapshot {
            city: self.city().unwrap_or_default().to_string(),
            box_id: self.box_id().unwrap_or_default().to_string(),
            client: self.client().unwrap_or_default().to_string(),
            items_in_box: self.items_in_box(),
            box_start: self.box_start(),
        }
    }

    /// Rebuild from a persisted snapshot
    ///
    /// A snapshot with a box but no city cannot come from this code; if one
    /// shows up anyway the box part is dropped rather than inventing a city.
    pub fn restore(snapshot: WorkSnapshot) -> WorkState {
        if snapshot.city.is_empty() {
            return WorkState::Idle;
        }
        if snapshot.box_id.is_empty() {
            return WorkState::CityOpen {
                city: snapshot.city,
            };
        }
        WorkState::BoxOpen {
            city: snapshot.city,
            box_id: snapshot.box_id,
            client: snapshot.client,
            items_in_box: snapshot.items_in_box,
            box_start: snapshot.box_start.unwrap_or_else(shared::util::now_millis),
        }
    }
}

/// What one classified scan means given the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Open a city; also produced when the already-open city is re-scanned
    /// (re-logged, state unchanged)
    OpenCity { city: String },
    /// Close the open city
    CloseCity { city: String },
    /// Open a box under the open city
    OpenBox { box_id: String, client: String },
    /// Close the open box (same id scanned again)
    CloseBox { box_id: String },
    /// Accept an item into the open box
    AcceptItem { code: String },
    /// Reject the scan and log an `ERROR` event with this code
    Reject { code: ErrorCode, details: String },
    /// A different box is open; the caller must consult recent history
    /// before deciding between self-heal and rejection
    BoxConflict { open_box: String, incoming: String },
}

/// Decide what a classified scan means. Pure; consult [`apply`] for the
/// state after a deterministic step.
pub fn step(state: &WorkState, code: &ScanCode) -> Step {
    match code {
        ScanCode::Cyrillic(raw) => Step::Reject {
            code: ErrorCode::CyrillicError,
            details: raw.clone(),
        },

        ScanCode::CityClose => match state {
            // Box check first: with a box open the city stays untouchable
            WorkState::BoxOpen { .. } => reject(ErrorCode::BoxNotClosed),
            WorkState::CityOpen { city } => Step::CloseCity { city: city.clone() },
            WorkState::Idle => reject(ErrorCode::NoCity),
        },

        ScanCode::CityOpen(new_city) => match state.city() {
            Some(open) if open != new_city => reject(ErrorCode::CityNotClosed),
            _ => Step::OpenCity {
                city: new_city.clone(),
            },
        },

        ScanCode::Box(incoming) => match state {
            WorkState::Idle => reject(ErrorCode::NoCity),
            WorkState::CityOpen { .. } => Step::OpenBox {
                box_id: incoming.clone(),
                client: client_of(incoming),
            },
            WorkState::BoxOpen { box_id, .. } if box_id == incoming => Step::CloseBox {
                box_id: incoming.clone(),
            },
            WorkState::BoxOpen { box_id, .. } => Step::BoxConflict {
                open_box: box_id.clone(),
                incoming: incoming.clone(),
            },
        },

        ScanCode::Item(item) => match state {
            WorkState::Idle => reject(ErrorCode::NoCity),
            WorkState::CityOpen { .. } => reject(ErrorCode::NoBox),
            WorkState::BoxOpen { .. } => Step::AcceptItem { code: item.clone() },
        },
    }
}

/// State after a deterministic step. `Reject` and `BoxConflict` leave the
/// state as it was; `BoxConflict` resolution is the session's call.
pub fn apply(state: &WorkState, step: &Step, now: i64) -> WorkState {
    match step {
        Step::OpenCity { city } => match state {
            // Re-scan of the open city while a box is open only re-logs
            WorkState::BoxOpen { .. } => state.clone(),
            _ => WorkState::CityOpen { city: city.clone() },
        },
        Step::CloseCity { .. } => WorkState::Idle,
        Step::OpenBox { box_id, client } => WorkState::BoxOpen {
            city: state.city().unwrap_or_default().to_string(),
            box_id: box_id.clone(),
            client: client.clone(),
            items_in_box: 0,
            box_start: now,
        },
        Step::CloseBox { .. } => WorkState::CityOpen {
            city: state.city().unwrap_or_default().to_string(),
        },
        Step::AcceptItem { .. } => match state {
            WorkState::BoxOpen {
                city,
                box_id,
                client,
                items_in_box,
                box_start,
            } => WorkState::BoxOpen {
                city: city.clone(),
                box_id: box_id.clone(),
                client: client.clone(),
                items_in_box: items_in_box + 1,
                box_start: *box_start,
            },
            _ => state.clone(),
        },
        Step::Reject { .. } | Step::BoxConflict { .. } => state.clone(),
    }
}

/// Client prefix of a composite box id (`client/number`); the whole id when
/// there is no slash.
pub fn client_of(box_id: &str) -> String {
    box_id.split('/').next().unwrap_or_default().to_string()
}

fn reject(code: ErrorCode) -> Step {
    Step::Reject {
        code,
        details: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city_open() -> WorkState {
        WorkState::CityOpen {
            city: "MSK".to_string(),
        }
    }

    fn box_open() -> WorkState {
        WorkState::BoxOpen {
            city: "MSK".to_string(),
            box_id: "ACME/001".to_string(),
            client: "ACME".to_string(),
            items_in_box: 2,
            box_start: 1_000,
        }
    }

    fn classify_step(state: &WorkState, raw: &str) -> Step {
        step(state, &ScanCode::classify(raw))
    }

    #[test]
    fn test_open_city_from_idle() {
        let step = classify_step(&WorkState::Idle, "CITY:MSK");
        assert_eq!(
            step,
            Step::OpenCity {
                city: "MSK".to_string()
            }
        );
        assert_eq!(apply(&WorkState::Idle, &step, 0), city_open());
    }

    #[test]
    fn test_second_city_rejected_same_city_relogged() {
        assert_eq!(
            classify_step(&city_open(), "CITY:SPB"),
            Step::Reject {
                code: ErrorCode::CityNotClosed,
                details: String::new()
            }
        );

        // Same city again is allowed and leaves the state alone
        let step = classify_step(&city_open(), "CITY:MSK");
        assert_eq!(
            step,
            Step::OpenCity {
                city: "MSK".to_string()
            }
        );
        assert_eq!(apply(&city_open(), &step, 0), city_open());

        // Even with a box open
        let step = classify_step(&box_open(), "CITY:MSK");
        assert_eq!(
            step,
            Step::OpenCity {
                city: "MSK".to_string()
            }
        );
        assert_eq!(apply(&box_open(), &step, 0), box_open());
    }

    #[test]
    fn test_city_close_guards() {
        assert_eq!(
            classify_step(&WorkState::Idle, "CITY:CLOSE"),
            Step::Reject {
                code: ErrorCode::NoCity,
                details: String::new()
            }
        );
        assert_eq!(
            classify_step(&box_open(), "CITY:CLOSE"),
            Step::Reject {
                code: ErrorCode::BoxNotClosed,
                details: String::new()
            }
        );

        let step = classify_step(&city_open(), "CITY:CLOSE");
        assert_eq!(
            step,
            Step::CloseCity {
                city: "MSK".to_string()
            }
        );
        assert_eq!(apply(&city_open(), &step, 0), WorkState::Idle);
    }

    #[test]
    fn test_box_requires_city() {
        assert_eq!(
            classify_step(&WorkState::Idle, "BOX:ACME/001"),
            Step::Reject {
                code: ErrorCode::NoCity,
                details: String::new()
            }
        );
    }

    #[test]
    fn test_open_box_derives_client_and_resets_count() {
        let step = classify_step(&city_open(), "BOX:ACME/001");
        assert_eq!(
            step,
            Step::OpenBox {
                box_id: "ACME/001".to_string(),
                client: "ACME".to_string()
            }
        );

        let next = apply(&city_open(), &step, 5_000);
        assert_eq!(
            next,
            WorkState::BoxOpen {
                city: "MSK".to_string(),
                box_id: "ACME/001".to_string(),
                client: "ACME".to_string(),
                items_in_box: 0,
                box_start: 5_000,
            }
        );
    }

    #[test]
    fn test_client_of_composite_ids() {
        assert_eq!(client_of("ACME/001"), "ACME");
        assert_eq!(client_of("ACME"), "ACME");
        assert_eq!(client_of("A/B/C"), "A");
        assert_eq!(client_of("/7"), "");
    }

    #[test]
    fn test_same_box_closes_different_box_conflicts() {
        let step = classify_step(&box_open(), "BOX:ACME/001");
        assert_eq!(
            step,
            Step::CloseBox {
                box_id: "ACME/001".to_string()
            }
        );
        assert_eq!(apply(&box_open(), &step, 0), city_open());

        assert_eq!(
            classify_step(&box_open(), "BOX:ACME/002"),
            Step::BoxConflict {
                open_box: "ACME/001".to_string(),
                incoming: "ACME/002".to_string()
            }
        );
    }

    #[test]
    fn test_items_only_inside_a_box() {
        assert_eq!(
            classify_step(&WorkState::Idle, "SKU-1"),
            Step::Reject {
                code: ErrorCode::NoCity,
                details: String::new()
            }
        );
        assert_eq!(
            classify_step(&city_open(), "SKU-1"),
            Step::Reject {
                code: ErrorCode::NoBox,
                details: String::new()
            }
        );

        let step = classify_step(&box_open(), "SKU-1");
        assert_eq!(
            step,
            Step::AcceptItem {
                code: "SKU-1".to_string()
            }
        );
        assert_eq!(apply(&box_open(), &step, 0).items_in_box(), 3);
    }

    #[test]
    fn test_cyrillic_rejected_in_any_state_with_details() {
        for state in [&WorkState::Idle, &city_open(), &box_open()] {
            assert_eq!(
                classify_step(state, "ЯЩИК-1"),
                Step::Reject {
                    code: ErrorCode::CyrillicError,
                    details: "ЯЩИК-1".to_string()
                }
            );
        }
    }

    #[test]
    fn test_reject_leaves_state_unchanged() {
        let step = classify_step(&city_open(), "CITY:SPB");
        assert_eq!(apply(&city_open(), &step, 0), city_open());

        let conflict = classify_step(&box_open(), "BOX:X/9");
        assert_eq!(apply(&box_open(), &conflict, 0), box_open());
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        for state in [WorkState::Idle, city_open(), box_open()] {
            assert_eq!(WorkState::restore(state.snapshot()), state);
        }
    }

    #[test]
    fn test_restore_drops_box_without_city() {
        let snapshot = WorkSnapshot {
            city: String::new(),
            box_id: "ACME/001".to_string(),
            client: "ACME".to_string(),
            items_in_box: 3,
            box_start: Some(1_000),
        };
        assert_eq!(WorkState::restore(snapshot), WorkState::Idle);
    }
}
