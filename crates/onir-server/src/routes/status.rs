use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    version: &'static str,
    in_flight: usize,
    subscribers: usize,
}

async fn handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        in_flight: state.broker.in_flight(),
        subscribers: state.events.receiver_count(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handler))
        .with_state(state)
}
