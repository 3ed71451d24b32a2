//! Scriptable immersive platform
//!
//! Stands in for a real headset runtime in the CLI and tests. Presets cover
//! the device classes the detector knows about; `trigger_device_end` ends the
//! active session from the "device" side, as taking the headset off would.

use super::{
    DeviceSignals, SessionFeature, SessionGrant, SessionInit, SessionMode, XrPlatform, XrSession,
    XrSessionEvent,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

const QUEST_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; Quest 3) AppleWebKit/537.36 \
    (KHTML, like Gecko) OculusBrowser/33.0 Chrome/126.0.0.0 VR Safari/537.36";
const PICO_UA: &str = "Mozilla/5.0 (Linux; Android 12; Pico 4 Build/SKQ1.221119.001) \
    AppleWebKit/537.36 (KHTML, like Gecko) PicoBrowser/3.3.22 Chrome/105.0.5195.68 VR Safari/537.36";
const GENERIC_HEADSET_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Mobile VR Safari/537.36";
const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

struct SimulatedSession {
    ended: AtomicBool,
    tx: mpsc::UnboundedSender<XrSessionEvent>,
}

impl SimulatedSession {
    /// Mark ended and notify the listener exactly once
    fn finish(&self) -> bool {
        if self.ended.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(XrSessionEvent::Ended);
        true
    }
}

#[async_trait]
impl XrSession for SimulatedSession {
    async fn end(&self) -> Result<()> {
        self.finish();
        Ok(())
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// In-process immersive platform with configurable behaviour
pub struct SimulatedXrPlatform {
    api_present: bool,
    supported: bool,
    signals: DeviceSignals,
    available_features: Vec<SessionFeature>,
    query_fails: AtomicBool,
    fail_requests: AtomicBool,
    support_queries: AtomicUsize,
    session_requests: AtomicUsize,
    active: Mutex<Option<Arc<SimulatedSession>>>,
}

impl SimulatedXrPlatform {
    fn build(
        api_present: bool,
        supported: bool,
        signals: DeviceSignals,
        available_features: Vec<SessionFeature>,
    ) -> Self {
        Self {
            api_present,
            supported,
            signals,
            available_features,
            query_fails: AtomicBool::new(false),
            fail_requests: AtomicBool::new(false),
            support_queries: AtomicUsize::new(0),
            session_requests: AtomicUsize::new(0),
            active: Mutex::new(None),
        }
    }

    /// Runtime without any immersive API
    pub fn none() -> Self {
        Self::build(
            false,
            false,
            DeviceSignals {
                user_agent: DESKTOP_UA.to_string(),
                max_touch_points: 0,
                platform: "Win32".to_string(),
            },
            Vec::new(),
        )
    }

    /// API present but no headset connected
    pub fn desktop_without_headset() -> Self {
        Self::build(
            true,
            false,
            DeviceSignals {
                user_agent: DESKTOP_UA.to_string(),
                max_touch_points: 0,
                platform: "Win32".to_string(),
            },
            Vec::new(),
        )
    }

    pub fn quest() -> Self {
        Self::build(
            true,
            true,
            DeviceSignals {
                user_agent: QUEST_UA.to_string(),
                max_touch_points: 0,
                platform: "Linux x86_64".to_string(),
            },
            vec![
                SessionFeature::LocalFloor,
                SessionFeature::BoundedFloor,
                SessionFeature::HandTracking,
            ],
        )
    }

    pub fn pico() -> Self {
        Self::build(
            true,
            true,
            DeviceSignals {
                user_agent: PICO_UA.to_string(),
                max_touch_points: 0,
                platform: "Linux armv8l".to_string(),
            },
            vec![SessionFeature::LocalFloor, SessionFeature::BoundedFloor],
        )
    }

    pub fn generic_headset() -> Self {
        Self::build(
            true,
            true,
            DeviceSignals {
                user_agent: GENERIC_HEADSET_UA.to_string(),
                max_touch_points: 0,
                platform: "Linux x86_64".to_string(),
            },
            vec![SessionFeature::LocalFloor],
        )
    }

    /// Preset by CLI name (`quest`, `pico`, `generic`, `desktop`, `none`)
    pub fn from_preset(name: &str) -> Result<Self> {
        match name {
            "quest" => Ok(Self::quest()),
            "pico" => Ok(Self::pico()),
            "generic" => Ok(Self::generic_headset()),
            "desktop" => Ok(Self::desktop_without_headset()),
            "none" => Ok(Self::none()),
            other => Err(Error::InvalidInput(format!("unknown headset preset '{}'", other))),
        }
    }

    /// Make `is_session_supported` return an error
    pub fn with_query_failure(self) -> Self {
        self.query_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Make subsequent `request_session` calls fail
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Number of `is_session_supported` calls so far
    pub fn support_queries(&self) -> usize {
        self.support_queries.load(Ordering::SeqCst)
    }

    pub fn session_requests(&self) -> usize {
        self.session_requests.load(Ordering::SeqCst)
    }

    pub fn has_active_session(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| !s.is_ended())
            .unwrap_or(false)
    }

    /// End the active session from the device side
    ///
    /// Returns false when there was no live session.
    pub fn trigger_device_end(&self) -> bool {
        let session = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        match session {
            Some(session) => {
                let ended = session.finish();
                if ended {
                    info!("Simulated device ended the immersive session");
                }
                ended
            }
            None => false,
        }
    }
}

#[async_trait]
impl XrPlatform for SimulatedXrPlatform {
    fn api_present(&self) -> bool {
        self.api_present
    }

    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool> {
        self.support_queries.fetch_add(1, Ordering::SeqCst);
        if self.query_fails.load(Ordering::SeqCst) {
            return Err(Error::CapabilityQuery(
                "immersive runtime did not respond".to_string(),
            ));
        }
        Ok(self.api_present && (mode == SessionMode::Inline || self.supported))
    }

    fn device_signals(&self) -> DeviceSignals {
        self.signals.clone()
    }

    async fn request_session(&self, mode: SessionMode, init: SessionInit) -> Result<SessionGrant> {
        self.session_requests.fetch_add(1, Ordering::SeqCst);

        if !self.api_present {
            return Err(Error::SessionRequest("immersive API unavailable".to_string()));
        }
        if mode == SessionMode::ImmersiveVr && !self.supported {
            return Err(Error::SessionRequest("no headset connected".to_string()));
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Error::SessionRequest("user denied the session request".to_string()));
        }
        if let Some(missing) = init
            .required_features
            .iter()
            .find(|f| !self.available_features.contains(f))
        {
            return Err(Error::SessionRequest(format!(
                "required feature {:?} not supported",
                missing
            )));
        }

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map(|s| !s.is_ended()).unwrap_or(false) {
            return Err(Error::SessionRequest(
                "an immersive session is already running".to_string(),
            ));
        }

        let enabled_features: Vec<SessionFeature> = init
            .required_features
            .iter()
            .chain(init.optional_features.iter())
            .filter(|f| self.available_features.contains(f))
            .copied()
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(SimulatedSession {
            ended: AtomicBool::new(false),
            tx,
        });
        *active = Some(session.clone());
        debug!(?enabled_features, "Simulated immersive session granted");

        Ok(SessionGrant {
            session,
            events: rx,
            enabled_features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vr_init() -> SessionInit {
        SessionInit {
            required_features: vec![SessionFeature::LocalFloor],
            optional_features: vec![SessionFeature::BoundedFloor, SessionFeature::HandTracking],
        }
    }

    #[tokio::test]
    async fn test_optional_features_filtered_by_device() {
        let platform = SimulatedXrPlatform::pico();
        let grant = platform
            .request_session(SessionMode::ImmersiveVr, vr_init())
            .await
            .unwrap();
        assert_eq!(
            grant.enabled_features,
            vec![SessionFeature::LocalFloor, SessionFeature::BoundedFloor]
        );
    }

    #[tokio::test]
    async fn test_device_end_emits_ended_once() {
        let platform = SimulatedXrPlatform::quest();
        let mut grant = platform
            .request_session(SessionMode::ImmersiveVr, vr_init())
            .await
            .unwrap();

        assert!(platform.trigger_device_end());
        assert!(!platform.trigger_device_end());
        grant.session.end().await.unwrap();

        assert_eq!(grant.events.recv().await, Some(XrSessionEvent::Ended));
        assert!(grant.events.try_recv().is_err());
        assert!(grant.session.is_ended());
    }

    #[tokio::test]
    async fn test_second_request_rejected_while_active() {
        let platform = SimulatedXrPlatform::quest();
        let _grant = platform
            .request_session(SessionMode::ImmersiveVr, vr_init())
            .await
            .unwrap();
        let second = platform
            .request_session(SessionMode::ImmersiveVr, vr_init())
            .await;
        assert!(matches!(second, Err(Error::SessionRequest(_))));
    }

    #[tokio::test]
    async fn test_desktop_reports_unsupported() {
        let platform = SimulatedXrPlatform::desktop_without_headset();
        assert!(platform.api_present());
        assert!(!platform
            .is_session_supported(SessionMode::ImmersiveVr)
            .await
            .unwrap());
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(SimulatedXrPlatform::from_preset("holodeck").is_err());
        assert!(SimulatedXrPlatform::from_preset("pico").is_ok());
    }
}
