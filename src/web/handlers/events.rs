//! SSE event streaming endpoint

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::web::AppState;

/// GET /api/v1/events/{topic}
///
/// Streams broadcast events for one topic as SSE. Subscription starts at
/// the moment of the request; lagged events are skipped, not replayed.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    debug!(topic = %topic, "SSE subscriber attached");
    let receiver = state.broadcaster.subscribe(&topic);

    let stream = BroadcastStream::new(receiver).filter_map(|result| {
        let event = match result {
            Ok(event) => event,
            // Slow consumer fell behind the ring buffer
            Err(_) => return None,
        };
        match Event::default().event(event.event_type.clone()).json_data(&event) {
            Ok(sse_event) => Some(Ok::<_, Infallible>(sse_event)),
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
