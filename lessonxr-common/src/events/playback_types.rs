//! Narration, asset and session type definitions
//!
//! Supporting types for narration playback, asset descriptors and the
//! immersive session lifecycle.

use serde::{Deserialize, Serialize};

/// Narration section, in fixed playback order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NarrationSection {
    Intro,
    Explanation,
    Outro,
}

impl NarrationSection {
    /// All sections in playback order
    pub const ORDER: [NarrationSection; 3] = [
        NarrationSection::Intro,
        NarrationSection::Explanation,
        NarrationSection::Outro,
    ];
}

impl std::fmt::Display for NarrationSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NarrationSection::Intro => write!(f, "intro"),
            NarrationSection::Explanation => write!(f, "explanation"),
            NarrationSection::Outro => write!(f, "outro"),
        }
    }
}

/// Narration playback state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NarrationState {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for NarrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NarrationState::Playing => write!(f, "playing"),
            NarrationState::Paused => write!(f, "paused"),
            NarrationState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Kind of a lesson asset reference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Model,
    Image,
}

/// Which path ended an immersive session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionEndOrigin {
    /// Explicit exit requested by the user
    User,
    /// Ended by the device or runtime (headset removed, system menu, ...)
    Device,
    /// Player teardown
    Teardown,
}

impl std::fmt::Display for SessionEndOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEndOrigin::User => write!(f, "user"),
            SessionEndOrigin::Device => write!(f, "device"),
            SessionEndOrigin::Teardown => write!(f, "teardown"),
        }
    }
}
