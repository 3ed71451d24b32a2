//! Immersive session lifecycle
//!
//! Entry is gated on a completed pipeline and a supported device. A granted
//! session gets a listener task for its `Ended` event. Explicit `exit()`, the
//! device ending the session, and player teardown all converge on `finish`,
//! which runs at most once per session id and restores preview mode.

use crate::error::{Error, Result};
use crate::scene::SceneHandle;
use crate::xr::{SessionFeature, SessionInit, SessionMode, XrPlatform, XrSession, XrSessionEvent};
use lessonxr_common::events::{
    CapabilityDescriptor, EventBus, PlayerEvent, SessionEndOrigin, Stage,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Entry gate: lesson fully loaded and immersive mode supported
pub fn can_enter(stage: Stage, capability: &CapabilityDescriptor) -> bool {
    stage == Stage::Complete && capability.immersive_supported
}

/// Caller's view of a granted session
#[derive(Debug, Clone)]
pub struct ImmersiveSessionHandle {
    pub id: Uuid,
    pub enabled_features: Vec<SessionFeature>,
    active: Arc<AtomicBool>,
}

impl ImmersiveSessionHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Serializable session state for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    pub session_id: Option<Uuid>,
    pub enabled_features: Vec<SessionFeature>,
}

struct ActiveSession {
    handle: ImmersiveSessionHandle,
    session: Arc<dyn XrSession>,
    listener: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SessionState {
    current: Option<ActiveSession>,
    pending: bool,
    torn_down: bool,
}

struct SessionInner {
    platform: Arc<dyn XrPlatform>,
    scene: SceneHandle,
    events: EventBus,
    state: Mutex<SessionState>,
}

/// Owns the immersive session and the scene's interaction mode
#[derive(Clone)]
pub struct ImmersiveSessionManager {
    inner: Arc<SessionInner>,
}

impl ImmersiveSessionManager {
    pub fn new(platform: Arc<dyn XrPlatform>, scene: SceneHandle, events: EventBus) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                platform,
                scene,
                events,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Request an immersive session
    ///
    /// # Errors
    /// - `Error::InvalidState` when gated or a session is already active or
    ///   pending; nothing is changed
    /// - `Error::SessionRequest` when the platform refuses, or when teardown
    ///   ran while the request was in flight; a late grant is ended at once
    pub async fn enter(
        &self,
        stage: Stage,
        capability: &CapabilityDescriptor,
    ) -> Result<ImmersiveSessionHandle> {
        if !can_enter(stage, capability) {
            debug!(stage = %stage, supported = capability.immersive_supported, "Immersive entry rejected");
            return Err(Error::InvalidState(format!(
                "immersive mode needs a loaded lesson and a supported headset (stage {}, supported {})",
                stage, capability.immersive_supported
            )));
        }

        {
            let mut state = self.inner.state.lock().await;
            if state.torn_down {
                return Err(Error::InvalidState("the player has been torn down".to_string()));
            }
            if state.current.is_some() || state.pending {
                return Err(Error::InvalidState(
                    "an immersive session is already active".to_string(),
                ));
            }
            state.pending = true;
        }

        let init = SessionInit {
            required_features: vec![SessionFeature::LocalFloor],
            optional_features: vec![SessionFeature::BoundedFloor, SessionFeature::HandTracking],
        };
        let result = self
            .inner
            .platform
            .request_session(SessionMode::ImmersiveVr, init)
            .await;

        let mut state = self.inner.state.lock().await;
        state.pending = false;

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                let message = match e {
                    Error::SessionRequest(message) => message,
                    other => other.to_string(),
                };
                warn!(error = %message, "Immersive session request failed");
                self.inner.events.emit_lossy(PlayerEvent::SessionRequestFailed {
                    error: message.clone(),
                    timestamp: chrono::Utc::now(),
                });
                return Err(Error::SessionRequest(message));
            }
        };

        if state.torn_down || !self.inner.scene.is_attached() {
            drop(state);
            warn!("Immersive session granted after teardown; ending it");
            if let Err(e) = grant.session.end().await {
                warn!(error = %e, "Platform failed to end late immersive session");
            }
            return Err(Error::SessionRequest(
                "player was torn down while the session request was pending".to_string(),
            ));
        }

        let handle = ImmersiveSessionHandle {
            id: Uuid::new_v4(),
            enabled_features: grant.enabled_features,
            active: Arc::new(AtomicBool::new(true)),
        };

        self.inner.scene.set_interaction_enabled(false).await;
        self.inner.scene.set_immersive(true).await;

        let listener = tokio::spawn(listen(Arc::clone(&self.inner), handle.id, grant.events));
        state.current = Some(ActiveSession {
            handle: handle.clone(),
            session: grant.session,
            listener: Some(listener),
        });

        info!(session_id = %handle.id, features = ?handle.enabled_features, "Immersive session started");
        self.inner.events.emit_lossy(PlayerEvent::SessionStarted {
            session_id: handle.id,
            timestamp: chrono::Utc::now(),
        });
        Ok(handle)
    }

    /// End the active session. Returns false when none was active.
    pub async fn exit(&self) -> bool {
        self.end_with(SessionEndOrigin::User).await
    }

    /// End any active session as part of player teardown
    ///
    /// Also refuses further entries, including a request already in flight.
    pub async fn shutdown(&self) {
        self.inner.state.lock().await.torn_down = true;
        self.end_with(SessionEndOrigin::Teardown).await;
    }

    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.current.is_some()
    }

    pub async fn current(&self) -> Option<ImmersiveSessionHandle> {
        self.inner
            .state
            .lock()
            .await
            .current
            .as_ref()
            .map(|s| s.handle.clone())
    }

    pub async fn status(&self) -> SessionStatus {
        match self.current().await {
            Some(handle) => SessionStatus {
                active: true,
                session_id: Some(handle.id),
                enabled_features: handle.enabled_features,
            },
            None => SessionStatus {
                active: false,
                session_id: None,
                enabled_features: Vec::new(),
            },
        }
    }

    async fn end_with(&self, origin: SessionEndOrigin) -> bool {
        let target = {
            let state = self.inner.state.lock().await;
            state
                .current
                .as_ref()
                .map(|s| (s.handle.id, Arc::clone(&s.session)))
        };
        let Some((id, session)) = target else {
            return false;
        };

        let finished = self.inner.finish(id, origin).await;
        if let Err(e) = session.end().await {
            warn!(session_id = %id, error = %e, "Platform failed to end immersive session");
        }
        finished
    }
}

impl SessionInner {
    /// Converge to the inactive state for session `id`
    ///
    /// Only the first call for a given id has any effect.
    async fn finish(&self, id: Uuid, origin: SessionEndOrigin) -> bool {
        let mut state = self.state.lock().await;
        let is_current = state
            .current
            .as_ref()
            .map(|s| s.handle.id == id)
            .unwrap_or(false);
        let ended = if is_current { state.current.take() } else { None };
        let Some(mut ended) = ended else {
            debug!(session_id = %id, %origin, "Session already finished");
            return false;
        };

        ended.handle.active.store(false, Ordering::SeqCst);
        self.scene.set_immersive(false).await;
        self.scene.set_interaction_enabled(true).await;

        info!(session_id = %id, %origin, "Immersive session ended");
        self.events.emit_lossy(PlayerEvent::SessionEnded {
            session_id: id,
            origin,
            timestamp: chrono::Utc::now(),
        });

        // The device path runs inside the listener, which exits by itself
        if origin != SessionEndOrigin::Device {
            if let Some(listener) = ended.listener.take() {
                listener.abort();
            }
        }
        true
    }
}

async fn listen(
    inner: Arc<SessionInner>,
    id: Uuid,
    mut events: mpsc::UnboundedReceiver<XrSessionEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            XrSessionEvent::Ended => break,
            XrSessionEvent::VisibilityChanged { visible } => {
                debug!(session_id = %id, visible, "Immersive session visibility changed");
            }
        }
    }
    inner.finish(id, SessionEndOrigin::Device).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonxr_common::events::DeviceClass;

    fn supported() -> CapabilityDescriptor {
        CapabilityDescriptor {
            immersive_supported: true,
            api_present: true,
            device_class: DeviceClass::Quest,
            diagnostic_message: None,
        }
    }

    #[test]
    fn test_can_enter_truth_table() {
        let unsupported = CapabilityDescriptor::unsupported("no api");
        for stage in [
            Stage::Init,
            Stage::Environment,
            Stage::Narration,
            Stage::Assets,
            Stage::Complete,
            Stage::Failed,
        ] {
            assert_eq!(can_enter(stage, &supported()), stage == Stage::Complete);
            assert!(!can_enter(stage, &unsupported));
        }
    }
}
