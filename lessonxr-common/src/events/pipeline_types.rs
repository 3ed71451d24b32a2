//! Loading pipeline type definitions
//!
//! Supporting types for stage tracking shared between the player and its
//! observers (control interface, CLI reporters).

use serde::{Deserialize, Serialize};

/// Loading pipeline stage
///
/// Stages follow a fixed total order:
/// Init → Environment → Narration → Assets → Complete.
/// `Failed` is reachable only from `Init`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting for a bundle and an attached scene
    Init,
    /// Loading the enclosing environment
    Environment,
    /// Loading narration segments
    Narration,
    /// Loading 3D assets
    Assets,
    /// Pipeline finished (possibly degraded)
    Complete,
    /// No playable bundle, nothing loads
    Failed,
}

impl Stage {
    /// Position in the fixed stage order (`Failed` shares the slot after `Init`)
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Init => 0,
            Stage::Environment | Stage::Failed => 1,
            Stage::Narration => 2,
            Stage::Assets => 3,
            Stage::Complete => 4,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    /// Whether this stage runs a loader
    pub fn is_loading(self) -> bool {
        matches!(self, Stage::Environment | Stage::Narration | Stage::Assets)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::Environment => write!(f, "environment"),
            Stage::Narration => write!(f, "narration"),
            Stage::Assets => write!(f, "assets"),
            Stage::Complete => write!(f, "complete"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Current pipeline status as seen by the UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageStatus {
    /// Current stage
    pub stage: Stage,
    /// Human-readable description of the current operation
    pub message: String,
    /// Aggregate progress, 0-100
    pub progress: u8,
    /// Most recent error recorded against the current attempt
    pub error: Option<String>,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self {
            stage: Stage::Init,
            message: String::from("Preparing lesson..."),
            progress: 0,
            error: None,
        }
    }
}
