//! Event types for the LessonXR event system
//!
//! Provides the shared event definitions and EventBus used by the player and
//! every observer of it (control interface, CLI reporter, tests).

// Sub-modules (supporting types)
mod device_types;
mod pipeline_types;
mod playback_types;

pub use device_types::{CapabilityDescriptor, DeviceClass};
pub use pipeline_types::{Stage, StageStatus};
pub use playback_types::{AssetKind, NarrationSection, NarrationState, SessionEndOrigin};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// LessonXR event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// All player components publish through this one enum so observers get
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Capability detection finished (emitted once per detector)
    CapabilityDetected {
        /// Immersive sessions can be requested
        immersive_supported: bool,
        /// Classified device
        device_class: DeviceClass,
        /// When detection finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pipeline stage changed
    ///
    /// Triggers:
    /// - SSE: Update loading overlay
    /// - Session gate: re-evaluate immersive entry
    StageChanged {
        /// Playback attempt this transition belongs to
        attempt_id: Uuid,
        /// Stage before the transition
        old_stage: Stage,
        /// Stage after the transition
        new_stage: Stage,
        /// Status message for the new stage
        message: String,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Aggregate loading progress moved forward
    ProgressUpdated {
        attempt_id: Uuid,
        /// Progress, 0-100 (non-decreasing within an attempt)
        progress: u8,
        /// Current operation
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage finished with a recoverable error
    ///
    /// The pipeline continues with a degraded fallback.
    StageError {
        attempt_id: Uuid,
        /// Stage that failed
        stage: Stage,
        /// Error description
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One 3D asset was placed in the scene
    AssetLoaded {
        asset_id: String,
        display_name: String,
        /// Completed count including this asset
        completed: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One 3D asset failed (retained with its error)
    AssetFailed {
        asset_id: String,
        error: String,
        completed: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A narration segment became current and started playing
    NarrationSegmentStarted {
        section: NarrationSection,
        /// 0-based index in the loaded segment list
        index: usize,
        /// Number of loaded segments
        total: usize,
        /// Caption text for the segment
        text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration playback state changed
    NarrationStateChanged {
        old_state: NarrationState,
        new_state: NarrationState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Last narration segment reached its natural end
    NarrationFinished {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Immersive session started
    SessionStarted {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Immersive session ended (emitted exactly once per session)
    SessionEnded {
        session_id: Uuid,
        /// Which path ended the session
        origin: SessionEndOrigin,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Immersive session request was rejected by the platform
    SessionRequestFailed {
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event type name (matches the serde tag, used as the SSE event field)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::CapabilityDetected { .. } => "CapabilityDetected",
            PlayerEvent::StageChanged { .. } => "StageChanged",
            PlayerEvent::ProgressUpdated { .. } => "ProgressUpdated",
            PlayerEvent::StageError { .. } => "StageError",
            PlayerEvent::AssetLoaded { .. } => "AssetLoaded",
            PlayerEvent::AssetFailed { .. } => "AssetFailed",
            PlayerEvent::NarrationSegmentStarted { .. } => "NarrationSegmentStarted",
            PlayerEvent::NarrationStateChanged { .. } => "NarrationStateChanged",
            PlayerEvent::NarrationFinished { .. } => "NarrationFinished",
            PlayerEvent::SessionStarted { .. } => "SessionStarted",
            PlayerEvent::SessionEnded { .. } => "SessionEnded",
            PlayerEvent::SessionRequestFailed { .. } => "SessionRequestFailed",
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lessonxr_common::events::{EventBus, PlayerEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PlayerEvent::NarrationFinished {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(PlayerEvent::NarrationFinished { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
