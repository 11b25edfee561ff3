use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::{
    stream::{BoxStream, StreamExt},
    Stream,
};
use onir::models::event::ChatEvent;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;

// Server-sent event stream of every chat event the broker emits
pub struct SseResponse {
    stream: BoxStream<'static, Result<Bytes, Infallible>>,
}

impl SseResponse {
    fn new(rx: broadcast::Receiver<ChatEvent>, shutdown: CancellationToken) -> Self {
        let stream = BroadcastStream::new(rx)
            .filter_map(|item| async move {
                match item {
                    Ok(event) => Some(Ok(Bytes::from(format_event(&event)))),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event subscriber lagging, events dropped");
                        None
                    }
                }
            })
            .take_until(shutdown.cancelled_owned())
            .boxed();
        Self { stream }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

// One SSE frame: the event name plus the JSON encoded event
fn format_event(event: &ChatEvent) -> String {
    let data = serde_json::to_string(event).unwrap_or_else(|_| String::from("{}"));
    format!("event: {}\ndata: {}\n\n", event.name(), data)
}

// Subscribe before starting a chat, events sent earlier are not replayed
async fn handler(State(state): State<AppState>) -> SseResponse {
    tracing::debug!(
        subscribers = state.events.receiver_count() + 1,
        "event subscriber connected"
    );
    SseResponse::new(state.events.subscribe(), state.shutdown.clone())
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/events", get(handler))
        .with_state(state)
}
