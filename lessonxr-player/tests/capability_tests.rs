//! Integration tests for immersive capability detection

mod helpers;

use helpers::*;
use lessonxr_common::events::{DeviceClass, PlayerEvent};
use lessonxr_player::capability::{recommend, CapabilityDetector, RecommendedAction};
use lessonxr_player::xr::SimulatedXrPlatform;
use std::sync::Arc;

#[tokio::test]
async fn test_query_failure_degrades_to_unsupported() {
    let platform = Arc::new(SimulatedXrPlatform::quest().with_query_failure());
    let detector = CapabilityDetector::new(platform.clone());

    let descriptor = detector.detect().await;

    assert!(!descriptor.immersive_supported);
    assert!(!descriptor.api_present);
    assert!(descriptor
        .diagnostic_message
        .as_deref()
        .is_some_and(|m| !m.is_empty()));
    assert!(recommend(&descriptor).can_fallback_to_2d);
}

#[tokio::test]
async fn test_concurrent_detection_queries_platform_once() {
    let platform = Arc::new(SimulatedXrPlatform::quest());
    let detector = Arc::new(CapabilityDetector::new(platform.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.detect().await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(platform.support_queries(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert!(results[0].immersive_supported);
    assert_eq!(results[0].device_class, DeviceClass::Quest);
    assert_eq!(detector.cached(), Some(results[0].clone()));
}

#[tokio::test]
async fn test_presets_map_to_recommendations() {
    let cases = [
        (SimulatedXrPlatform::quest(), true, RecommendedAction::EnterImmersive),
        (SimulatedXrPlatform::pico(), true, RecommendedAction::EnterImmersive),
        (
            SimulatedXrPlatform::desktop_without_headset(),
            false,
            RecommendedAction::ConnectHeadset,
        ),
        (SimulatedXrPlatform::none(), false, RecommendedAction::UseCompatibleBrowser),
    ];

    for (platform, supported, action) in cases {
        let descriptor = CapabilityDetector::new(Arc::new(platform)).detect().await;
        assert_eq!(descriptor.immersive_supported, supported);
        assert_eq!(recommend(&descriptor).action, action, "{:?}", descriptor);
    }
}

#[tokio::test]
async fn test_player_detects_once_across_mounts() {
    let t = TestPlayer::builder().build();
    let mut rx = t.player.subscribe();

    t.player.mount(Some(ids())).await.unwrap();
    t.player.mount(Some(ids())).await.unwrap();
    let descriptor = t.player.capability().await;

    assert!(descriptor.immersive_supported);
    assert_eq!(t.platform.support_queries(), 1);

    let mut detected = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PlayerEvent::CapabilityDetected { .. }) {
            detected += 1;
        }
    }
    assert_eq!(detected, 1);

    t.player.unmount().await;
}
