use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use onir::{
    errors::ChatError,
    models::{message::Message, options::GenerationOptions},
    RequestId,
};
use serde::{Deserialize, Serialize};

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    messages: Vec<Message>,
    #[serde(default)]
    options: GenerationOptions,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    request_id: RequestId,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn status_for(err: &ChatError) -> StatusCode {
    if err.is_setup() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

async fn start_handler(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    // A body that does not describe a conversation is a setup error too
    let Json(request) = request.map_err(|rejection| {
        tracing::warn!("Rejected chat request: {}", rejection.body_text());
        bad_request(rejection.body_text())
    })?;

    let credential = request
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .or(state.api_key.as_deref())
        .unwrap_or_default();

    match state
        .broker
        .start(&request.messages, &request.options, credential)
    {
        Ok(request_id) => Ok(Json(ChatResponse { request_id })),
        Err(err) => {
            tracing::warn!("Failed to start chat: {}", err);
            Err((
                status_for(&err),
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

// Fire-and-forget: unknown or finished ids are not an error
async fn cancel_handler(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
) -> StatusCode {
    state.broker.cancel(request_id);
    StatusCode::NO_CONTENT
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(start_handler))
        .route("/chat/:request_id/cancel", post(cancel_handler))
        .with_state(state)
}
