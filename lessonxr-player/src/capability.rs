//! Immersive capability detection
//!
//! Detection runs at most once per detector: the first `detect()` queries the
//! platform and every later call (including concurrent ones) awaits the same
//! memoized result.

use crate::xr::{DeviceSignals, SessionMode, XrPlatform};
use lessonxr_common::events::{CapabilityDescriptor, DeviceClass, EventBus, PlayerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

const NO_API_MESSAGE: &str = "Immersive mode is not available in this runtime. \
    Open the lesson in a WebXR-compatible browser or headset runtime.";
const NO_HEADSET_MESSAGE: &str = "No headset detected. Connect a headset to enter immersive mode.";

/// What the UI should suggest to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    EnterImmersive,
    ConnectHeadset,
    UseCompatibleBrowser,
    UsePreview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub message: String,
    pub can_fallback_to_2d: bool,
    pub action: RecommendedAction,
}

/// Memoizing capability probe over an injected platform
pub struct CapabilityDetector {
    platform: Arc<dyn XrPlatform>,
    events: Option<EventBus>,
    cached: OnceCell<CapabilityDescriptor>,
}

impl CapabilityDetector {
    pub fn new(platform: Arc<dyn XrPlatform>) -> Self {
        Self {
            platform,
            events: None,
            cached: OnceCell::new(),
        }
    }

    /// Publish `CapabilityDetected` on `events` when detection completes
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Probe the platform (first call only) and return the descriptor
    ///
    /// Never fails: query errors degrade to "not supported".
    pub async fn detect(&self) -> CapabilityDescriptor {
        self.cached
            .get_or_init(|| async {
                let descriptor = self.probe().await;
                info!(
                    supported = descriptor.immersive_supported,
                    api_present = descriptor.api_present,
                    device = %descriptor.device_class,
                    "Capability detected"
                );
                if let Some(events) = &self.events {
                    events.emit_lossy(PlayerEvent::CapabilityDetected {
                        immersive_supported: descriptor.immersive_supported,
                        device_class: descriptor.device_class,
                        timestamp: chrono::Utc::now(),
                    });
                }
                descriptor
            })
            .await
            .clone()
    }

    /// Descriptor if detection already ran
    pub fn cached(&self) -> Option<CapabilityDescriptor> {
        self.cached.get().cloned()
    }

    async fn probe(&self) -> CapabilityDescriptor {
        let device_class = classify(&self.platform.device_signals());

        if !self.platform.api_present() {
            return CapabilityDescriptor {
                device_class,
                ..CapabilityDescriptor::unsupported(NO_API_MESSAGE)
            };
        }

        match self.platform.is_session_supported(SessionMode::ImmersiveVr).await {
            Ok(true) => CapabilityDescriptor {
                immersive_supported: true,
                api_present: true,
                device_class,
                diagnostic_message: None,
            },
            Ok(false) => CapabilityDescriptor {
                immersive_supported: false,
                api_present: true,
                device_class,
                diagnostic_message: Some(NO_HEADSET_MESSAGE.to_string()),
            },
            Err(e) => {
                warn!(error = %e, "Immersive support query failed");
                CapabilityDescriptor {
                    device_class,
                    ..CapabilityDescriptor::unsupported(format!(
                        "Could not check immersive support: {}",
                        e
                    ))
                }
            }
        }
    }
}

/// Best-effort device classification from environment hints
///
/// Headset markers are checked before mobile ones because headset browsers
/// also advertise Android/mobile tokens.
pub fn classify(signals: &DeviceSignals) -> DeviceClass {
    let ua = signals.user_agent.to_ascii_lowercase();
    let platform = signals.platform.to_ascii_lowercase();

    if ua.contains("oculusbrowser") || ua.contains("quest") {
        return DeviceClass::Quest;
    }
    if ua.contains("pico") {
        return DeviceClass::Pico;
    }
    if ua.contains(" vr ") || ua.contains("mobile vr") || ua.contains("headset") {
        return DeviceClass::GenericHeadset;
    }
    if ua.contains("iphone")
        || ua.contains("ipad")
        || (ua.contains("android") && ua.contains("mobile"))
        || (signals.max_touch_points > 1 && platform.contains("macintel"))
    {
        return DeviceClass::Mobile;
    }
    if ua.contains("windows") || ua.contains("macintosh") || ua.contains("x11") || ua.contains("cros")
    {
        return DeviceClass::Desktop;
    }
    if platform.starts_with("win") || platform.starts_with("mac") || platform.starts_with("linux") {
        return DeviceClass::Desktop;
    }
    DeviceClass::Unknown
}

/// User-facing suggestion for a descriptor
pub fn recommend(descriptor: &CapabilityDescriptor) -> Recommendation {
    if descriptor.immersive_supported {
        let device = match descriptor.device_class {
            DeviceClass::Quest => "your Quest headset",
            DeviceClass::Pico => "your Pico headset",
            _ => "your headset",
        };
        return Recommendation {
            message: format!("Enter immersive mode to view this lesson in {}.", device),
            can_fallback_to_2d: true,
            action: RecommendedAction::EnterImmersive,
        };
    }

    if !descriptor.api_present {
        return Recommendation {
            message: descriptor
                .diagnostic_message
                .clone()
                .unwrap_or_else(|| NO_API_MESSAGE.to_string()),
            can_fallback_to_2d: true,
            action: RecommendedAction::UseCompatibleBrowser,
        };
    }

    match descriptor.device_class {
        DeviceClass::Desktop => Recommendation {
            message: NO_HEADSET_MESSAGE.to_string(),
            can_fallback_to_2d: true,
            action: RecommendedAction::ConnectHeadset,
        },
        DeviceClass::Quest | DeviceClass::Pico | DeviceClass::GenericHeadset => Recommendation {
            message: "Immersive mode is unavailable on this headset right now. \
                Check that the headset runtime is active, or continue in preview."
                .to_string(),
            can_fallback_to_2d: true,
            action: RecommendedAction::UsePreview,
        },
        DeviceClass::Mobile | DeviceClass::Unknown => Recommendation {
            message: "Use the 3D preview: drag to look around, pinch or scroll to zoom."
                .to_string(),
            can_fallback_to_2d: true,
            action: RecommendedAction::UsePreview,
        },
    }
}
