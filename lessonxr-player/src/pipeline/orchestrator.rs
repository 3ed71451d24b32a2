//! Loading stage orchestrator
//!
//! # Stage Progression
//! Init → Environment → Narration → Assets → Complete
//! (Init → Failed when there is no bundle)
//!
//! Each loading stage runs its loader to completion and then feeds
//! `StageSettled` back into the transition function, whatever the loader's
//! outcome. Failures are recorded on the tracker and in the report.

use super::stage::{
    assets_progress, stage_message, transition, StageInput, PROGRESS_ENVIRONMENT_DONE,
    PROGRESS_INIT, PROGRESS_NARRATION_DONE,
};
use super::tracker::StatusTracker;
use crate::assets::{AssetDescriptor, AssetLoader};
use crate::bundle::LessonBundle;
use crate::environment::{EnvironmentLoader, EnvironmentOutcome};
use crate::narration::{NarrationController, NarrationSegment};
use crate::scene::SceneHandle;
use lessonxr_common::events::{Stage, StageStatus};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// One recoverable failure recorded during an attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageErrorRecord {
    pub stage: Stage,
    pub message: String,
}

/// Everything one playback attempt produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub attempt_id: Uuid,
    pub status: StageStatus,
    /// Stages entered, in order
    pub visited: Vec<Stage>,
    pub environment: Option<EnvironmentOutcome>,
    pub segments: Vec<NarrationSegment>,
    pub assets: Vec<AssetDescriptor>,
    pub stage_errors: Vec<StageErrorRecord>,
    /// The attempt was abandoned before reaching a terminal stage
    pub cancelled: bool,
}

impl PipelineReport {
    fn new(attempt_id: Uuid) -> Self {
        Self {
            attempt_id,
            status: StageStatus::default(),
            visited: vec![Stage::Init],
            environment: None,
            segments: Vec::new(),
            assets: Vec::new(),
            stage_errors: Vec::new(),
            cancelled: false,
        }
    }
}

pub struct Orchestrator {
    tracker: Arc<StatusTracker>,
    environment: EnvironmentLoader,
    narration: Arc<NarrationController>,
    assets: AssetLoader,
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

impl Orchestrator {
    pub fn new(
        tracker: Arc<StatusTracker>,
        environment: EnvironmentLoader,
        narration: Arc<NarrationController>,
        assets: AssetLoader,
    ) -> Self {
        Self {
            tracker,
            environment,
            narration,
            assets,
        }
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    /// Run one playback attempt from `Init`
    ///
    /// Starts by resetting the tracker. The attempt fails at `Init` unless both
    /// a bundle and an attached scene are given.
    pub async fn run(
        &self,
        bundle: Option<Arc<LessonBundle>>,
        scene: Option<&SceneHandle>,
        cancel: CancellationToken,
    ) -> PipelineReport {
        let attempt_id = self.tracker.reset();
        let mut report = PipelineReport::new(attempt_id);
        self.tracker
            .set_progress(PROGRESS_INIT, stage_message(Stage::Init));

        let ready = match (&bundle, scene) {
            (Some(bundle), Some(scene)) if scene.is_attached() => Some((bundle.clone(), scene)),
            _ => None,
        };
        let mut input = if ready.is_some() {
            StageInput::BundleReady
        } else {
            StageInput::BundleMissing
        };

        info!(
            attempt_id = %attempt_id,
            lesson = %bundle.as_ref().map(|b| b.ids().to_string()).unwrap_or_else(|| "-".to_string()),
            "Starting lesson pipeline"
        );

        let mut stage = Stage::Init;
        loop {
            let next = transition(stage, input);
            if next == stage {
                break;
            }
            if let Err(e) = self.tracker.advance(next, stage_message(next)) {
                warn!(attempt_id = %attempt_id, error = %e, "Stage transition rejected");
                break;
            }
            report.visited.push(next);
            stage = next;

            let Some((bundle, scene)) = ready.as_ref() else {
                break;
            };
            let settled = match stage {
                Stage::Environment => until_cancelled(
                    &cancel,
                    self.run_environment(bundle, scene, &mut report),
                )
                .await,
                Stage::Narration => {
                    until_cancelled(&cancel, self.run_narration(bundle, &mut report)).await
                }
                Stage::Assets => {
                    until_cancelled(&cancel, self.run_assets(bundle, scene, &mut report)).await
                }
                Stage::Init | Stage::Complete | Stage::Failed => break,
            };

            if settled.is_none() {
                info!(attempt_id = %attempt_id, stage = %stage, "Lesson pipeline cancelled");
                report.cancelled = true;
                break;
            }
            input = StageInput::StageSettled;
        }

        if stage == Stage::Failed {
            let reason = match &bundle {
                None => "no lesson bundle available",
                Some(_) => "render surface not attached",
            };
            self.record(&mut report, Stage::Init, reason.to_string());
        }

        report.status = self.tracker.current();
        info!(
            attempt_id = %attempt_id,
            stage = %report.status.stage,
            progress = report.status.progress,
            errors = report.stage_errors.len(),
            "Lesson pipeline finished"
        );
        report
    }

    fn record(&self, report: &mut PipelineReport, stage: Stage, message: String) {
        self.tracker.record_error(stage, message.clone());
        report.stage_errors.push(StageErrorRecord { stage, message });
    }

    async fn run_environment(
        &self,
        bundle: &LessonBundle,
        scene: &SceneHandle,
        report: &mut PipelineReport,
    ) {
        let outcome = self
            .environment
            .load(bundle.topic.environment.as_ref(), scene)
            .await;
        if let Some(error) = &outcome.error {
            self.record(report, Stage::Environment, error.clone());
        }
        let message = if outcome.fallback {
            "Using neutral environment"
        } else {
            "Environment ready"
        };
        self.tracker.set_progress(PROGRESS_ENVIRONMENT_DONE, message);
        report.environment = Some(outcome);
    }

    async fn run_narration(&self, bundle: &LessonBundle, report: &mut PipelineReport) {
        self.narration.load_segments(&bundle.topic.narration).await;
        let failures = self.narration.preload().await;
        if !failures.is_empty() {
            self.record(report, Stage::Narration, failures.join("; "));
        }
        report.segments = self.narration.snapshot().await.segments;
        self.tracker.set_progress(
            PROGRESS_NARRATION_DONE,
            format!("{} narration segment(s) ready", report.segments.len()),
        );
    }

    async fn run_assets(&self, bundle: &LessonBundle, scene: &SceneHandle, report: &mut PipelineReport) {
        let tracker = &self.tracker;
        let descriptors = self
            .assets
            .load_all(&bundle.topic.assets, scene, |completed, total| {
                tracker.set_progress(
                    assets_progress(completed, total),
                    format!("Loaded {} of {} models", completed, total),
                );
            })
            .await;

        let failed: Vec<String> = descriptors
            .iter()
            .filter_map(|d| d.error.as_ref().map(|e| format!("{}: {}", d.id, e)))
            .collect();
        if !failed.is_empty() {
            self.record(
                report,
                Stage::Assets,
                format!("{} of {} asset(s) failed ({})", failed.len(), descriptors.len(), failed.join("; ")),
            );
        }
        report.assets = descriptors;
    }
}
