//! Stage transition function and progress mapping
//!
//! Pure and synchronous; the orchestrator feeds inputs and performs effects.

use lessonxr_common::events::Stage;

/// Inputs that move the stage machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// A valid bundle and an attached scene are both available
    BundleReady,
    /// No bundle could be produced
    BundleMissing,
    /// The current stage's loader finished, successfully or not
    StageSettled,
}

/// Next stage for `input`; inputs that do not apply leave the stage unchanged
pub fn transition(stage: Stage, input: StageInput) -> Stage {
    match (stage, input) {
        (Stage::Init, StageInput::BundleReady) => Stage::Environment,
        (Stage::Init, StageInput::BundleMissing) => Stage::Failed,
        (Stage::Environment, StageInput::StageSettled) => Stage::Narration,
        (Stage::Narration, StageInput::StageSettled) => Stage::Assets,
        (Stage::Assets, StageInput::StageSettled) => Stage::Complete,
        (stage, _) => stage,
    }
}

pub const PROGRESS_INIT: u8 = 5;
pub const PROGRESS_ENVIRONMENT_DONE: u8 = 40;
pub const PROGRESS_NARRATION_DONE: u8 = 60;
/// Highest value reachable before `Complete`
pub const PROGRESS_ASSETS_MAX: u8 = 99;
pub const PROGRESS_COMPLETE: u8 = 100;

/// Progress after `completed` of `total` assets have settled
pub fn assets_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_NARRATION_DONE;
    }
    let span = (PROGRESS_ASSETS_MAX - PROGRESS_NARRATION_DONE) as usize;
    let completed = completed.min(total);
    PROGRESS_NARRATION_DONE + (span * completed / total) as u8
}

/// Status message shown on entering `stage`
pub fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Init => "Preparing lesson...",
        Stage::Environment => "Loading environment...",
        Stage::Narration => "Loading narration...",
        Stage::Assets => "Loading 3D models...",
        Stage::Complete => "Lesson ready",
        Stage::Failed => "Lesson unavailable",
    }
}
