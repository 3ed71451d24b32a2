//! Stage status publication
//!
//! `StatusTracker` is the single writer of `StageStatus`. It publishes the
//! latest value on a watch channel and mirrors each change onto the event bus.

use super::stage::{stage_message, PROGRESS_ASSETS_MAX, PROGRESS_COMPLETE};
use crate::error::{Error, Result};
use lessonxr_common::events::{EventBus, PlayerEvent, Stage, StageStatus};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct StatusTracker {
    tx: watch::Sender<StageStatus>,
    events: EventBus,
    attempt_id: Mutex<Uuid>,
}

impl StatusTracker {
    pub fn new(events: EventBus) -> Self {
        let (tx, _) = watch::channel(StageStatus::default());
        Self {
            tx,
            events,
            attempt_id: Mutex::new(Uuid::new_v4()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StageStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StageStatus {
        self.tx.borrow().clone()
    }

    pub fn attempt_id(&self) -> Uuid {
        *self.attempt_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new attempt at `Init` with progress 0
    pub fn reset(&self) -> Uuid {
        let attempt_id = Uuid::new_v4();
        *self.attempt_id.lock().unwrap_or_else(|e| e.into_inner()) = attempt_id;

        let old = self.tx.send_replace(StageStatus::default());
        debug!(attempt_id = %attempt_id, "Stage tracker reset");
        if old.stage != Stage::Init {
            self.events.emit_lossy(PlayerEvent::StageChanged {
                attempt_id,
                old_stage: old.stage,
                new_stage: Stage::Init,
                message: stage_message(Stage::Init).to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        attempt_id
    }

    /// Move to the next stage in the fixed order
    ///
    /// Reaching `Complete` sets progress to 100.
    ///
    /// # Errors
    /// `Error::InvalidState` for any transition other than one step forward
    /// (or `Init → Failed`).
    pub fn advance(&self, new_stage: Stage, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let current = self.current();
        let old_stage = current.stage;

        let allowed = !old_stage.is_terminal()
            && match new_stage {
                Stage::Failed => old_stage == Stage::Init,
                _ => new_stage.ordinal() == old_stage.ordinal() + 1,
            };
        if !allowed {
            return Err(Error::InvalidState(format!(
                "cannot move from {} to {}",
                old_stage, new_stage
            )));
        }

        self.tx.send_modify(|status| {
            status.stage = new_stage;
            status.message = message.clone();
            if new_stage == Stage::Complete {
                status.progress = PROGRESS_COMPLETE;
            }
        });

        let attempt_id = self.attempt_id();
        info!(attempt_id = %attempt_id, from = %old_stage, to = %new_stage, "Stage changed");
        self.events.emit_lossy(PlayerEvent::StageChanged {
            attempt_id,
            old_stage,
            new_stage,
            message,
            timestamp: chrono::Utc::now(),
        });
        if new_stage == Stage::Complete {
            self.emit_progress(PROGRESS_COMPLETE, "Lesson ready".to_string());
        }
        Ok(())
    }

    /// Raise progress; lower values are ignored. Capped at 99 before `Complete`.
    ///
    /// Returns the progress in effect afterwards.
    pub fn set_progress(&self, progress: u8, message: impl Into<String>) -> u8 {
        let message = message.into();
        let mut changed = false;
        self.tx.send_if_modified(|status| {
            let cap = if status.stage == Stage::Complete {
                PROGRESS_COMPLETE
            } else {
                PROGRESS_ASSETS_MAX
            };
            let progress = progress.min(cap);
            if progress <= status.progress {
                return false;
            }
            status.progress = progress;
            status.message = message.clone();
            changed = true;
            true
        });

        let current = self.tx.borrow().progress;
        if changed {
            self.emit_progress(current, message);
        }
        current
    }

    /// Record a recoverable stage failure against the current attempt
    pub fn record_error(&self, stage: Stage, error: impl Into<String>) {
        let error = error.into();
        let attempt_id = self.attempt_id();
        warn!(attempt_id = %attempt_id, stage = %stage, error = %error, "Stage error recorded");

        self.tx.send_modify(|status| {
            status.error = Some(format!("{}: {}", stage, error));
        });
        self.events.emit_lossy(PlayerEvent::StageError {
            attempt_id,
            stage,
            error,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_progress(&self, progress: u8, message: String) {
        self.events.emit_lossy(PlayerEvent::ProgressUpdated {
            attempt_id: self.attempt_id(),
            progress,
            message,
            timestamp: chrono::Utc::now(),
        });
    }
}
