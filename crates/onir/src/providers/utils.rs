use serde_json::{json, Map, Value};

use crate::errors::{ChatError, ChatResult};
use crate::models::event::StreamEvent;
use crate::models::message::Message;
use crate::models::options::GenerationOptions;
use crate::models::role::Role;

/// Keys of the request body that the client always sets itself
const RESERVED_KEYS: [&str; 2] = ["messages", "stream"];

/// Convert internal Message format to the OpenAI-style message specification
///   the system prompt is only added when the conversation does not already carry one
pub fn messages_to_openai_spec(messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
    let mut messages_spec = Vec::with_capacity(messages.len() + 1);

    let starts_with_system = messages
        .first()
        .is_some_and(|message| message.role == Role::System);
    if let Some(prompt) = system_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        if !starts_with_system {
            messages_spec.push(json!({
                "role": Role::System,
                "content": prompt,
            }));
        }
    }

    messages_spec.extend(messages.iter().map(|message| {
        json!({
            "role": message.role,
            "content": message.content,
        })
    }));
    messages_spec
}

/// Build the streaming chat completion body
pub fn build_chat_payload(
    model: &str,
    messages: Vec<Value>,
    options: &GenerationOptions,
) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));

    for (key, value) in options.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::debug!(key = %key, "ignoring reserved generation option");
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }

    payload.insert("messages".to_string(), Value::Array(messages));
    payload.insert("stream".to_string(), Value::Bool(true));
    Value::Object(payload)
}

/// Decode the `data:` field of one server-sent event.
///
/// Returns `Ok(None)` for frames that carry no text (role-only deltas, usage
/// frames, empty keep-alives).
pub fn decode_stream_data(data: &str) -> ChatResult<Option<StreamEvent>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(StreamEvent::Complete));
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| ChatError::MalformedStream(format!("{}: {}", e, data)))?;

    if let Some(error) = value.get("error") {
        return Ok(Some(StreamEvent::Error(format!(
            "DeepSeek API error: {}",
            error_message(error)
        ))));
    }

    let content = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());

    Ok(content.map(|text| StreamEvent::Chunk(text.to_string())))
}

/// Pull a readable message out of an error response body
pub fn api_error_message(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error") {
            Some(error) => error_message(error),
            None => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| error.as_str().map(String::from))
        .unwrap_or_else(|| error.to_string())
}
