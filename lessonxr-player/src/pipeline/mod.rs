//! Loading pipeline: stage machine, status tracking and the orchestrator

pub mod orchestrator;
pub mod stage;
pub mod tracker;

pub use orchestrator::{Orchestrator, PipelineReport, StageErrorRecord};
pub use stage::{assets_progress, transition, StageInput};
pub use tracker::StatusTracker;
