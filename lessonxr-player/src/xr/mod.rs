//! Platform immersive-session API
//!
//! The player talks to the host's immersive runtime only through these traits.
//! A granted session comes with its own event channel; the session manager owns
//! the receiving end for the lifetime of the session.

pub mod simulated;

pub use simulated::SimulatedXrPlatform;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Session mode requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Inline,
    ImmersiveVr,
}

/// Tracking/input features a session may enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionFeature {
    /// Floor-relative reference space
    LocalFloor,
    /// Play-area boundary
    BoundedFloor,
    HandTracking,
}

/// Feature request for `request_session`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInit {
    /// Session is refused if any of these is unavailable
    pub required_features: Vec<SessionFeature>,
    /// Enabled when available, silently skipped otherwise
    pub optional_features: Vec<SessionFeature>,
}

/// Events emitted by a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrSessionEvent {
    /// Session is over (explicit end, headset removed, runtime shutdown)
    Ended,
    VisibilityChanged { visible: bool },
}

/// Environment hints used for device classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub max_touch_points: u32,
    pub platform: String,
}

/// A running immersive session
#[async_trait]
pub trait XrSession: Send + Sync {
    /// Ask the platform to end the session
    ///
    /// The platform answers with `XrSessionEvent::Ended` on the session's
    /// event channel. Ending an already-ended session is not an error.
    async fn end(&self) -> Result<()>;

    fn is_ended(&self) -> bool;
}

/// Successful session request
pub struct SessionGrant {
    pub session: Arc<dyn XrSession>,
    pub events: mpsc::UnboundedReceiver<XrSessionEvent>,
    pub enabled_features: Vec<SessionFeature>,
}

impl std::fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGrant")
            .field("enabled_features", &self.enabled_features)
            .finish_non_exhaustive()
    }
}

/// Host immersive runtime
#[async_trait]
pub trait XrPlatform: Send + Sync {
    /// Whether the immersive-session API exists at all
    fn api_present(&self) -> bool;

    /// Whether `mode` can be requested right now (a headset is connected)
    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool>;

    fn device_signals(&self) -> DeviceSignals;

    async fn request_session(&self, mode: SessionMode, init: SessionInit) -> Result<SessionGrant>;
}
