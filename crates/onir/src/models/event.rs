use serde::{Deserialize, Serialize};

use crate::broker::RequestId;

/// One item produced by a streaming chat call.
///
/// A stream yields any number of `Chunk`s followed by at most one terminal
/// item. A stream that was cancelled ends without a terminal item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Complete,
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk(_))
    }

    pub fn for_request(self, request_id: RequestId) -> ChatEvent {
        match self {
            StreamEvent::Chunk(text) => ChatEvent::Chunk { request_id, text },
            StreamEvent::Complete => ChatEvent::Complete { request_id },
            StreamEvent::Error(message) => ChatEvent::Error {
                request_id,
                message,
            },
        }
    }
}

/// A stream event tagged with the request it belongs to, as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Chunk {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        text: String,
    },
    Complete {
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        message: String,
    },
}

impl ChatEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            ChatEvent::Chunk { request_id, .. }
            | ChatEvent::Complete { request_id }
            | ChatEvent::Error { request_id, .. } => *request_id,
        }
    }

    /// Event name used on the SSE wire
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Chunk { .. } => "chunk",
            ChatEvent::Complete { .. } => "complete",
            ChatEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatEvent::Chunk { .. })
    }
}
