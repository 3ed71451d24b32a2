//! HTTP server setup and routing

use crate::error::Result;
use crate::player::LessonPlayer;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub player: Arc<LessonPlayer>,
    pub port: u16,
}

/// Build the router (no listener; used directly by tests)
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::status))
        .route("/capability", get(super::handlers::capability))
        // Narration
        .route("/narration", get(super::handlers::narration))
        .route("/narration/play", post(super::handlers::narration_play))
        .route("/narration/pause", post(super::handlers::narration_pause))
        .route("/narration/stop", post(super::handlers::narration_stop))
        .route("/narration/next", post(super::handlers::narration_next))
        // Assets
        .route("/assets", get(super::handlers::assets))
        // Immersive session
        .route("/session/enter", post(super::handlers::session_enter))
        .route("/session/exit", post(super::handlers::session_exit))
        // Lesson lifecycle
        .route("/lesson/retry", post(super::handlers::lesson_retry))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve the control interface until `shutdown` resolves
pub async fn run<F>(player: Arc<LessonPlayer>, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(AppContext { player, port });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Control interface listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Control interface stopped");
    Ok(())
}
