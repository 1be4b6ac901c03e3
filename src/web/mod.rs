pub mod dashboard;
pub mod feedback;
pub mod session;

use crate::events::ChangeFeed;
use crate::services::pipeline::ValidationError;
use crate::state::SharedState;
use axum::{
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use uuid::Uuid;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/feedback", feedback::router(state.clone()))
        .nest("/dashboard", dashboard::router(state))
}

pub(crate) fn validation_status(err: &ValidationError) -> StatusCode {
    match err {
        ValidationError::EmptyMessage => StatusCode::BAD_REQUEST,
        ValidationError::MessageTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

/// Streams change-feed events as SSE, optionally limited to one feedback
/// thread. Lagged events are skipped; clients refetch on reconnect.
pub(crate) fn event_stream(
    feed: &ChangeFeed,
    feedback_id: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(feed.subscribe()).filter_map(move |result| {
        let event = result.ok()?;
        if feedback_id.is_some_and(|id| id != event.feedback_id()) {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event(event.kind()).data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
