use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::base::{ChatStream, Provider};
use super::factory::ProviderFactory;
use crate::errors::{ChatError, ChatResult};
use crate::models::event::StreamEvent;
use crate::models::message::Message;
use crate::models::options::GenerationOptions;

/// One scripted step: wait, then yield the event
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay: Duration,
    pub event: StreamEvent,
}

impl MockStep {
    pub fn chunk<S: Into<String>>(text: S) -> Self {
        Self::after(Duration::ZERO, StreamEvent::Chunk(text.into()))
    }

    pub fn complete() -> Self {
        Self::after(Duration::ZERO, StreamEvent::Complete)
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::after(Duration::ZERO, StreamEvent::Error(message.into()))
    }

    pub fn after(delay: Duration, event: StreamEvent) -> Self {
        Self { delay, event }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A mock provider that replays a pre-configured script for testing
///
/// The script is replayed verbatim, so tests can also feed it sequences a
/// real provider never produces (chunks after a terminal event, say).
pub struct MockProvider {
    steps: Vec<MockStep>,
}

impl MockProvider {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self { steps }
    }
}

impl Provider for MockProvider {
    fn stream(
        &self,
        messages: &[Message],
        _options: &GenerationOptions,
        cancel: CancellationToken,
    ) -> ChatResult<ChatStream> {
        if messages.is_empty() {
            return Err(ChatError::EmptyConversation);
        }

        let steps = self.steps.clone();
        Ok(Box::pin(async_stream::stream! {
            for step in steps {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(step.delay) => {}
                }
                yield step.event;
            }
        }))
    }
}

/// Hands out one scripted provider per `create` call, in order
///
/// Once the scripts run out every new provider completes immediately.
#[derive(Clone, Default)]
pub struct MockFactory {
    scripts: Arc<Mutex<VecDeque<Vec<MockStep>>>>,
    setup_error: Option<ChatError>,
    credentials: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub fn new(scripts: Vec<Vec<MockStep>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            ..Default::default()
        }
    }

    /// A factory whose providers can never be built
    pub fn failing(error: ChatError) -> Self {
        Self {
            setup_error: Some(error),
            ..Default::default()
        }
    }

    /// Credentials seen by `create`, oldest first
    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

impl ProviderFactory for MockFactory {
    fn create(&self, credential: &str) -> ChatResult<Box<dyn Provider>> {
        self.credentials.lock().unwrap().push(credential.to_string());
        if let Some(err) = &self.setup_error {
            return Err(err.clone());
        }
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![MockStep::complete()]);
        Ok(Box::new(MockProvider::new(steps)))
    }
}
