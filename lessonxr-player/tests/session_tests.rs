//! Integration tests for the immersive session lifecycle
//!
//! Exercises entry gating, request failure, explicit exit and device-side
//! termination through LessonPlayer.

mod helpers;

use helpers::*;
use lessonxr_common::events::{
    CapabilityDescriptor, DeviceClass, EventBus, PlayerEvent, SessionEndOrigin, Stage,
};
use lessonxr_player::config::PlayerSettings;
use lessonxr_player::scene::{HeadlessSurface, SceneManager};
use lessonxr_player::session::ImmersiveSessionManager;
use async_trait::async_trait;
use lessonxr_player::xr::{
    DeviceSignals, SessionGrant, SessionInit, SessionMode, SimulatedXrPlatform, XrPlatform,
};
use lessonxr_player::Error;
use std::sync::Arc;
use tokio::sync::Notify;

fn supported() -> CapabilityDescriptor {
    CapabilityDescriptor {
        immersive_supported: true,
        api_present: true,
        device_class: DeviceClass::Quest,
        diagnostic_message: None,
    }
}

/// Holds `request_session` open until released
struct GatedPlatform {
    inner: SimulatedXrPlatform,
    entered: Notify,
    release: Notify,
}

impl GatedPlatform {
    fn new() -> Self {
        Self {
            inner: SimulatedXrPlatform::quest(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl XrPlatform for GatedPlatform {
    fn api_present(&self) -> bool {
        self.inner.api_present()
    }

    async fn is_session_supported(&self, mode: SessionMode) -> lessonxr_player::Result<bool> {
        self.inner.is_session_supported(mode).await
    }

    fn device_signals(&self) -> DeviceSignals {
        self.inner.device_signals()
    }

    async fn request_session(
        &self,
        mode: SessionMode,
        init: SessionInit,
    ) -> lessonxr_player::Result<SessionGrant> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.request_session(mode, init).await
    }
}

/// Entry during Narration is rejected with no side effects
#[tokio::test]
async fn test_enter_before_complete_is_rejected_without_side_effects() {
    let platform = Arc::new(SimulatedXrPlatform::quest());
    let scene = SceneManager::attach(
        Arc::new(HeadlessSurface::default()),
        &PlayerSettings::default(),
    )
    .unwrap();
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let manager = ImmersiveSessionManager::new(platform.clone(), scene.clone(), events);

    let result = manager.enter(Stage::Narration, &supported()).await;

    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(platform.session_requests(), 0);
    assert!(!manager.is_active().await);
    assert!(manager.current().await.is_none());
    assert!(scene.interaction_enabled().await);
    assert!(!scene.is_immersive().await);
    assert!(rx.try_recv().is_err());

    scene.detach().await;
}

#[tokio::test]
async fn test_enter_and_exit_restore_preview() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let scene = t.player.scene().await.unwrap();

    let handle = t.player.enter_immersive().await.unwrap();

    assert!(handle.is_active());
    assert!(!scene.interaction_enabled().await);
    assert!(scene.is_immersive().await);
    let status = t.player.session_status().await.unwrap();
    assert!(status.active);
    assert_eq!(status.session_id, Some(handle.id));

    // Second entry while active is refused
    assert!(matches!(
        t.player.enter_immersive().await,
        Err(Error::InvalidState(_))
    ));

    assert!(t.player.exit_immersive().await.unwrap());
    assert!(!handle.is_active());
    assert!(scene.interaction_enabled().await);
    assert!(!scene.is_immersive().await);
    assert!(!t.platform.has_active_session());

    // Exit with nothing active
    assert!(!t.player.exit_immersive().await.unwrap());

    t.player.unmount().await;
}

/// Device-side end converges to the same state as an explicit exit
#[tokio::test]
async fn test_device_end_matches_explicit_exit() {
    let explicit = TestPlayer::builder().build();
    explicit.player.mount(Some(ids())).await.unwrap();
    explicit.player.enter_immersive().await.unwrap();
    explicit.player.exit_immersive().await.unwrap();
    let explicit_scene = explicit.player.scene().await.unwrap();
    let explicit_status = explicit.player.session_status().await.unwrap();

    let device = TestPlayer::builder().build();
    device.player.mount(Some(ids())).await.unwrap();
    let mut rx = device.player.subscribe();
    let handle = device.player.enter_immersive().await.unwrap();
    let device_scene = device.player.scene().await.unwrap();

    assert!(device.platform.trigger_device_end());
    assert!(wait_until(|| async { !device.player.session_status().await.unwrap().active }).await);
    let device_status = device.player.session_status().await.unwrap();

    assert!(!handle.is_active());
    assert_eq!(device_status.active, explicit_status.active);
    assert_eq!(device_status.session_id, explicit_status.session_id);
    assert_eq!(
        device_scene.interaction_enabled().await,
        explicit_scene.interaction_enabled().await
    );
    assert_eq!(
        device_scene.is_immersive().await,
        explicit_scene.is_immersive().await
    );
    assert!(device_scene.interaction_enabled().await);

    let mut origin = None;
    while let Ok(event) = rx.try_recv() {
        if let PlayerEvent::SessionEnded { origin: o, .. } = event {
            assert!(origin.is_none(), "SessionEnded emitted twice");
            origin = Some(o);
        }
    }
    assert_eq!(origin, Some(SessionEndOrigin::Device));

    // A new session can start afterwards
    assert!(device.player.enter_immersive().await.is_ok());

    explicit.player.unmount().await;
    device.player.unmount().await;
}

#[tokio::test]
async fn test_request_failure_keeps_preview() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let mut rx = t.player.subscribe();
    let scene = t.player.scene().await.unwrap();
    t.platform.set_fail_requests(true);

    let result = t.player.enter_immersive().await;

    assert!(matches!(result, Err(Error::SessionRequest(_))));
    assert!(scene.interaction_enabled().await);
    assert!(!scene.is_immersive().await);
    assert!(!t.player.session_status().await.unwrap().active);
    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PlayerEvent::SessionRequestFailed { .. }) {
            failed = true;
        }
    }
    assert!(failed);

    // Request succeeds once the platform recovers
    t.platform.set_fail_requests(false);
    assert!(t.player.enter_immersive().await.is_ok());

    t.player.unmount().await;
}

#[tokio::test]
async fn test_enter_without_headset_is_gated() {
    let t = TestPlayer::builder()
        .platform(SimulatedXrPlatform::desktop_without_headset())
        .build();
    t.player.mount(Some(ids())).await.unwrap();

    let result = t.player.enter_immersive().await;

    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(t.platform.session_requests(), 0);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_unmount_ends_active_session() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let mut rx = t.player.subscribe();
    let handle = t.player.enter_immersive().await.unwrap();

    t.player.unmount().await;

    assert!(!handle.is_active());
    assert!(!t.platform.has_active_session());
    let mut origin = None;
    while let Ok(event) = rx.try_recv() {
        if let PlayerEvent::SessionEnded { origin: o, .. } = event {
            origin = Some(o);
        }
    }
    assert_eq!(origin, Some(SessionEndOrigin::Teardown));
}

#[tokio::test]
async fn test_session_calls_require_mounted_lesson() {
    let t = TestPlayer::builder().build();

    assert!(matches!(
        t.player.enter_immersive().await,
        Err(Error::InvalidState(_))
    ));
    assert!(t.player.session_status().await.is_none());
}

/// Teardown during a pending request ends the late grant and leaves no session
#[tokio::test]
async fn test_teardown_during_pending_request_ends_late_session() {
    let platform = Arc::new(GatedPlatform::new());
    let scene = SceneManager::attach(
        Arc::new(HeadlessSurface::default()),
        &PlayerSettings::default(),
    )
    .unwrap();
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let manager = ImmersiveSessionManager::new(platform.clone(), scene.clone(), events);

    let entering = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.enter(Stage::Complete, &supported()).await })
    };
    platform.entered.notified().await;

    manager.shutdown().await;
    scene.detach().await;
    platform.release.notify_one();

    let result = entering.await.unwrap();
    assert!(matches!(result, Err(Error::SessionRequest(_))));
    assert!(!manager.is_active().await);
    assert!(!manager.status().await.active);
    assert!(!platform.inner.has_active_session());
    assert_eq!(platform.inner.session_requests(), 1);

    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, PlayerEvent::SessionStarted { .. }));
    }

    // Torn-down manager refuses new entries without asking the platform
    assert!(matches!(
        manager.enter(Stage::Complete, &supported()).await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(platform.inner.session_requests(), 1);
}

/// A grant that arrives for an unmounted player is ended, not installed
#[tokio::test]
async fn test_enter_after_unmount_ends_grant() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let scene = t.player.scene().await.unwrap();
    let platform = Arc::new(SimulatedXrPlatform::quest());
    let manager = ImmersiveSessionManager::new(platform.clone(), scene.clone(), EventBus::new(16));

    t.player.unmount().await;

    assert!(!scene.is_attached());
    assert!(matches!(
        manager.enter(Stage::Complete, &supported()).await,
        Err(Error::SessionRequest(_))
    ));
    assert!(!manager.is_active().await);
    assert_eq!(platform.session_requests(), 1);
    assert!(!platform.has_active_session());
}
