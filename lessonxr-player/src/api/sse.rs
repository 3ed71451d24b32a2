//! Server-Sent Events stream of player events
//!
//! Each client first receives a `Status` event with the current stage status,
//! then every player event as it is published. `?types=A,B` limits the stream
//! to the named event types.

use crate::api::server::AppContext;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use lessonxr_common::events::PlayerEvent;
use serde::Deserialize;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Comma-separated event type names
    types: Option<String>,
}

impl EventFilter {
    fn wanted(&self) -> Option<HashSet<String>> {
        let types: HashSet<String> = self
            .types
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        (!types.is_empty()).then_some(types)
    }
}

fn to_sse(event: &PlayerEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!(event = event.event_type(), "Failed to serialize event: {}", e);
            None
        }
    }
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let wanted = filter.wanted().map(Arc::new);
    debug!(filter = ?wanted, "New SSE client connected");

    // Subscribe before reading status so no transition falls in between
    let rx = ctx.player.subscribe();
    let initial = Event::default()
        .event("Status")
        .json_data(ctx.player.status())
        .map_err(|e| warn!("Failed to serialize status: {}", e))
        .ok()
        .map(Ok);

    let updates = BroadcastStream::new(rx).filter_map(move |result| {
        let wanted = wanted.clone();
        async move {
            match result {
                Ok(event) => {
                    let keep = wanted
                        .as_ref()
                        .map_or(true, |w| w.contains(event.event_type()));
                    if keep {
                        to_sse(&event).map(Ok)
                    } else {
                        None
                    }
                }
                Err(e) => {
                    // Lagged subscriber; skip and keep streaming
                    warn!("SSE stream lagged: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream::iter(initial).chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
