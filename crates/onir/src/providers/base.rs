use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::errors::ChatResult;
use crate::models::event::StreamEvent;
use crate::models::message::Message;
use crate::models::options::GenerationOptions;

/// Incremental output of one chat completion call
pub type ChatStream = BoxStream<'static, StreamEvent>;

/// Base trait for chat completion providers
pub trait Provider: Send + Sync {
    /// Prepare a streaming chat completion.
    ///
    /// Anything that can be checked without touching the network is checked
    /// here and reported as an `Err`. The returned stream performs the request
    /// when first polled, yields `Chunk`s in arrival order and finishes with
    /// exactly one `Complete` or `Error`, unless `cancel` fires first, in which
    /// case it ends without a terminal event.
    fn stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
        cancel: CancellationToken,
    ) -> ChatResult<ChatStream>;
}
