//! Device capability type definitions

use serde::{Deserialize, Serialize};

/// Closed set of device classes recognised by capability detection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Meta Quest family standalone headset
    Quest,
    /// Pico family standalone headset
    Pico,
    /// Any other head-mounted display runtime
    GenericHeadset,
    /// Desktop browser or native desktop runtime
    Desktop,
    /// Phone or tablet
    Mobile,
    /// Not enough signal to classify
    Unknown,
}

impl DeviceClass {
    /// Whether the class is a head-mounted display
    pub fn is_headset(self) -> bool {
        matches!(
            self,
            DeviceClass::Quest | DeviceClass::Pico | DeviceClass::GenericHeadset
        )
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Quest => write!(f, "quest"),
            DeviceClass::Pico => write!(f, "pico"),
            DeviceClass::GenericHeadset => write!(f, "generic_headset"),
            DeviceClass::Desktop => write!(f, "desktop"),
            DeviceClass::Mobile => write!(f, "mobile"),
            DeviceClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of probing the platform for immersive-rendering support
///
/// Computed once per detector and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Immersive session mode is supported right now
    pub immersive_supported: bool,
    /// The platform exposes an immersive-session API at all
    pub api_present: bool,
    /// Best-effort device classification
    pub device_class: DeviceClass,
    /// User-facing explanation when support is missing
    pub diagnostic_message: Option<String>,
}

impl CapabilityDescriptor {
    /// Descriptor used when nothing is known (before detection completes)
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            immersive_supported: false,
            api_present: false,
            device_class: DeviceClass::Unknown,
            diagnostic_message: Some(message.into()),
        }
    }
}
