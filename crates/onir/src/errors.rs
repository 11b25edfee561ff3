use thiserror::Error;

/// Failures of a chat request.
///
/// The first group are setup errors: they are returned from
/// [`Broker::start`](crate::broker::Broker::start) before a request id is
/// handed out. The second group happen while a stream is running and are
/// only ever reported as an `error` event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Conversation must contain at least one message")]
    EmptyConversation,

    #[error("API key is missing")]
    MissingCredential,

    #[error("API key is not valid: {0}")]
    InvalidCredential(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to build request: {0}")]
    Serialization(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("DeepSeek API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed stream data: {0}")]
    MalformedStream(String),
}

impl ChatError {
    /// True for errors raised before any network activity starts.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyConversation
                | ChatError::MissingCredential
                | ChatError::InvalidCredential(_)
                | ChatError::Client(_)
                | ChatError::Serialization(_)
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
