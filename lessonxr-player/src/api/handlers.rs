//! HTTP request handlers

use crate::api::server::AppContext;
use crate::assets::AssetDescriptor;
use crate::capability::{recommend, Recommendation};
use crate::error::Error;
use crate::narration::NarrationSnapshot;
use crate::pipeline::PipelineReport;
use crate::session::{can_enter, SessionStatus};
use crate::xr::SessionFeature;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lessonxr_common::events::{CapabilityDescriptor, StageStatus};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

// ============================================================================
// Error mapping
// ============================================================================

/// Player error rendered as `{ "error": { "code", "message" } }`
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::IncompleteContent(_) => (StatusCode::NOT_FOUND, "incomplete_content"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            Error::SessionRequest(_) => (StatusCode::BAD_GATEWAY, "session_request_failed"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::Playback(_) => (StatusCode::CONFLICT, "playback_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Serialize)]
pub struct LessonSummary {
    chapter_id: String,
    topic_id: String,
    title: String,
    learning_objective: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: StageStatus,
    mounted: bool,
    lesson: Option<LessonSummary>,
    session: Option<SessionStatus>,
    can_enter_immersive: bool,
}

#[derive(Debug, Serialize)]
pub struct CapabilityResponse {
    descriptor: CapabilityDescriptor,
    recommendation: Recommendation,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    advanced: bool,
    narration: NarrationSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SessionEnterResponse {
    session_id: Uuid,
    enabled_features: Vec<SessionFeature>,
}

#[derive(Debug, Serialize)]
pub struct SessionExitResponse {
    ended: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "lessonxr-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

/// GET /status - pipeline status, mounted lesson and session state
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let player = &ctx.player;
    let status = player.status();
    let lesson = player.bundle().await.map(|b| LessonSummary {
        chapter_id: b.chapter.id.clone(),
        topic_id: b.topic.id.clone(),
        title: b.topic.title.clone(),
        learning_objective: b.topic.learning_objective.clone(),
    });
    let capability = player.capability().await;

    Json(StatusResponse {
        can_enter_immersive: can_enter(status.stage, &capability),
        mounted: player.is_mounted().await,
        session: player.session_status().await,
        status,
        lesson,
    })
}

/// GET /capability
pub async fn capability(State(ctx): State<AppContext>) -> Json<CapabilityResponse> {
    let descriptor = ctx.player.capability().await;
    Json(CapabilityResponse {
        recommendation: recommend(&descriptor),
        descriptor,
    })
}

/// GET /narration
pub async fn narration(State(ctx): State<AppContext>) -> Json<NarrationSnapshot> {
    Json(ctx.player.narration().snapshot().await)
}

/// POST /narration/play
pub async fn narration_play(State(ctx): State<AppContext>) -> ApiResult<NarrationSnapshot> {
    ctx.player.narration().play().await?;
    Ok(Json(ctx.player.narration().snapshot().await))
}

/// POST /narration/pause
pub async fn narration_pause(State(ctx): State<AppContext>) -> ApiResult<NarrationSnapshot> {
    ctx.player.narration().pause().await?;
    Ok(Json(ctx.player.narration().snapshot().await))
}

/// POST /narration/stop
pub async fn narration_stop(State(ctx): State<AppContext>) -> Json<NarrationSnapshot> {
    ctx.player.narration().stop().await;
    Json(ctx.player.narration().snapshot().await)
}

/// POST /narration/next - no-op on the last segment
pub async fn narration_next(State(ctx): State<AppContext>) -> Json<SkipResponse> {
    let advanced = ctx.player.narration().skip_to_next().await;
    Json(SkipResponse {
        advanced,
        narration: ctx.player.narration().snapshot().await,
    })
}

/// GET /assets - descriptors from the last pipeline run, failures included
pub async fn assets(State(ctx): State<AppContext>) -> Json<Vec<AssetDescriptor>> {
    let assets = ctx
        .player
        .last_report()
        .await
        .map(|r| r.assets)
        .unwrap_or_default();
    Json(assets)
}

/// POST /session/enter
pub async fn session_enter(State(ctx): State<AppContext>) -> ApiResult<SessionEnterResponse> {
    let handle = ctx.player.enter_immersive().await?;
    info!(session_id = %handle.id, "Immersive session entered via API");
    Ok(Json(SessionEnterResponse {
        session_id: handle.id,
        enabled_features: handle.enabled_features,
    }))
}

/// POST /session/exit
pub async fn session_exit(State(ctx): State<AppContext>) -> ApiResult<SessionExitResponse> {
    let ended = ctx.player.exit_immersive().await?;
    Ok(Json(SessionExitResponse { ended }))
}

/// POST /lesson/retry - tear down and run the pipeline again
pub async fn lesson_retry(State(ctx): State<AppContext>) -> ApiResult<PipelineReport> {
    info!("Lesson retry requested via API");
    let report = ctx.player.retry().await?;
    Ok(Json(report))
}
