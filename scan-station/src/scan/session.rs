//! ScanSession - side effects around the pure state machine
//!
//! Owns the work state plus everything `step`/`apply` deliberately avoid:
//! event logging, work-state snapshots, sync triggers and operator feedback.
//! One session per station, driven by a single serialized input loop.

use std::sync::Arc;
use std::time::Duration;

use shared::{ErrorCode, EventContext, EventKind, ScanEvent};

use crate::feedback::{Feedback, Notice, Tone};
use crate::scan::code::ScanCode;
use crate::scan::machine::{self, Step, WorkState};
use crate::store::{keys, EventStore, SettingsStore};
use crate::sync::{SyncEngine, SyncHandle};
use crate::utils::AppResult;

/// How many recent events the box-conflict check consults
const CONFLICT_LOOKBACK: usize = 50;

pub struct ScanSession {
    events: EventStore,
    settings: SettingsStore,
    engine: Arc<SyncEngine>,
    sync: SyncHandle,
    feedback: Arc<dyn Feedback>,
    state: WorkState,
    operator: String,
    /// Item count of the most recently closed box, for the status display
    last_box_items_count: u32,
}

impl ScanSession {
    /// Build a session, restoring work state and operator from settings
    pub fn new(
        events: EventStore,
        settings: SettingsStore,
        engine: Arc<SyncEngine>,
        sync: SyncHandle,
        feedback: Arc<dyn Feedback>,
    ) -> AppResult<Self> {
        let state = WorkState::restore(settings.work_state()?);
        let operator = settings.get::<String>(keys::OPERATOR)?.unwrap_or_default();
        if state != WorkState::Idle {
            tracing::info!(
                city = state.city().unwrap_or_default(),
                box_id = state.box_id().unwrap_or_default(),
                items = state.items_in_box(),
                "Restored work state"
            );
        }
        Ok(Self {
            events,
            settings,
            engine,
            sync,
            feedback,
            state,
            operator,
            last_box_items_count: 0,
        })
    }

    pub fn state(&self) -> &WorkState {
        &self.state
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn last_box_items_count(&self) -> u32 {
        self.last_box_items_count
    }

    pub fn set_operator(&mut self, operator: &str) -> AppResult<()> {
        self.operator = operator.trim().to_string();
        self.settings.put(keys::OPERATOR, &self.operator)?;
        Ok(())
    }

    /// Process one scan exactly as keyed by the operator
    ///
    /// Every accepted transition and every rejection writes exactly one
    /// durable event; empty input writes none. Returns the logged event.
    /// Storage failures propagate; rule violations never do.
    pub async fn handle_scan(&mut self, raw: &str) -> AppResult<Option<ScanEvent>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let code = ScanCode::classify(raw);
        let step = machine::step(&self.state, &code);
        let now = shared::util::now_millis();

        match &step {
            Step::OpenCity { city } => {
                self.state = machine::apply(&self.state, &step, now);
                let event = self.log(EventKind::City, city)?;
                self.persist_state()?;
                self.feedback.pill(Tone::Ok, "CITY");
                Ok(Some(event))
            }

            Step::CloseCity { city } => {
                self.sync.cancel_debounce();
                let event = self.log(EventKind::CityClose, city)?;
                if self.engine.is_online() {
                    let _ = self.engine.sync_now().await;
                }
                self.state = machine::apply(&self.state, &step, now);
                self.persist_state()?;
                self.feedback.say(Notice::CityClosed);
                self.feedback.pill(Tone::Ok, "IDLE");
                Ok(Some(event))
            }

            Step::OpenBox { box_id, .. } => {
                self.state = machine::apply(&self.state, &step, now);
                self.last_box_items_count = 0;
                let event = self.log(EventKind::Box, box_id)?;
                self.persist_state()?;
                self.feedback.pill(Tone::Ok, "BOX");
                Ok(Some(event))
            }

            Step::CloseBox { box_id } => {
                self.sync.cancel_debounce();
                let event = self.log(EventKind::Close, box_id)?;
                if self.engine.is_online() {
                    let _ = self.engine.sync_now().await;
                }
                self.last_box_items_count = self.state.items_in_box();
                self.state = machine::apply(&self.state, &step, now);
                self.persist_state()?;
                self.feedback.pill(Tone::Ok, "IDLE");
                Ok(Some(event))
            }

            Step::AcceptItem { code } => {
                self.state = machine::apply(&self.state, &step, now);
                let event = self.log(EventKind::Item, code)?;
                self.persist_state()?;
                self.sync.debounce();
                Ok(Some(event))
            }

            Step::Reject { code, details } => {
                self.feedback.reject(*code);
                let event = self.log_error(*code, details)?;
                Ok(Some(event))
            }

            Step::BoxConflict { open_box, incoming } => {
                let recent = self.events.tail(CONFLICT_LOOKBACK)?;
                let recently_closed = recent
                    .iter()
                    .rev()
                    .any(|event| event.kind == EventKind::Close && event.box_id == *open_box);

                if recently_closed {
                    // The log already holds a CLOSE for this box, so the open
                    // state is stale. Clear it and drop the triggering scan.
                    tracing::warn!(
                        open_box = %open_box,
                        incoming = %incoming,
                        "Cleared stale open box; close already on record"
                    );
                    self.state = WorkState::CityOpen {
                        city: self.state.city().unwrap_or_default().to_string(),
                    };
                    self.persist_state()?;
                    self.feedback.pill(Tone::Ok, "IDLE");
                    Ok(None)
                } else {
                    self.feedback.reject(ErrorCode::BoxNotClosed);
                    let event = self.log_error(ErrorCode::BoxNotClosed, "")?;
                    Ok(Some(event))
                }
            }
        }
    }

    /// Close the open box once it has been sitting longer than `max_age`
    ///
    /// Returns the logged `AUTO_CLOSE` event when a close happened. No sync
    /// is triggered; the periodic timer picks the event up.
    pub fn auto_close_expired(&mut self, max_age: Duration) -> AppResult<Option<ScanEvent>> {
        let Some(box_start) = self.state.box_start() else {
            return Ok(None);
        };
        let age = shared::util::now_millis() - box_start;
        if age <= max_age.as_millis() as i64 {
            return Ok(None);
        }

        let box_id = self.state.box_id().unwrap_or_default().to_string();
        let event = self.log(EventKind::AutoClose, &box_id)?;
        self.last_box_items_count = self.state.items_in_box();
        self.state = WorkState::CityOpen {
            city: self.state.city().unwrap_or_default().to_string(),
        };
        self.persist_state()?;
        self.feedback.pill(Tone::Warn, "AUTO_CLOSE");
        self.feedback.say(Notice::BoxTimeout);
        Ok(Some(event))
    }

    fn context(&self) -> EventContext {
        EventContext {
            operator: self.operator.clone(),
            client: self.state.client().unwrap_or_default().to_string(),
            city: self.state.city().unwrap_or_default().to_string(),
            box_id: self.state.box_id().unwrap_or_default().to_string(),
        }
    }

    fn log(&self, kind: EventKind, code: &str) -> AppResult<ScanEvent> {
        let event = ScanEvent::new(kind, code, &self.context());
        self.events.append(&event)?;
        self.engine.note_unsent(event.timestamp);
        Ok(event)
    }

    fn log_error(&self, code: ErrorCode, details: &str) -> AppResult<ScanEvent> {
        let event = ScanEvent::error(code, details, &self.context());
        self.events.append(&event)?;
        self.engine.note_unsent(event.timestamp);
        Ok(event)
    }

    fn persist_state(&self) -> AppResult<()> {
        self.settings.save_work_state(&self.state.snapshot())?;
        Ok(())
    }
}
