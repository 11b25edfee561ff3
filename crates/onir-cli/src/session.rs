use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use onir::models::event::ChatEvent;
use onir::models::message::Message;
use onir::models::options::GenerationOptions;
use onir::{Broker, EventReceiver, RequestId};

use crate::prompt::{InputType, Prompt};

/// How one turn of the conversation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed(String),
    Interrupted,
}

type Interrupt = Box<dyn FnMut() -> BoxFuture<'static, ()>>;

pub struct Session<'a> {
    broker: Arc<Broker>,
    events: EventReceiver,
    prompt: Box<dyn Prompt + 'a>,
    options: GenerationOptions,
    api_key: String,
    messages: Vec<Message>,
    interrupt: Interrupt,
}

impl<'a> Session<'a> {
    pub fn new(
        broker: Arc<Broker>,
        events: EventReceiver,
        prompt: Box<impl Prompt + 'a>,
        api_key: String,
    ) -> Self {
        Session {
            broker,
            events,
            prompt,
            options: GenerationOptions::new(),
            api_key,
            messages: Vec::new(),
            interrupt: Box::new(ctrl_c),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the Ctrl+C handler that stops a reply in progress
    #[cfg(test)]
    pub fn with_interrupt<F>(mut self, interrupt: F) -> Self
    where
        F: FnMut() -> BoxFuture<'static, ()> + 'static,
    {
        self.interrupt = Box::new(interrupt);
        self
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.onir_ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.messages.push(Message::user(content));
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }

            self.process_turn().await;
        }
        self.prompt.close();
        Ok(())
    }

    /// Send a single message, print the reply and stop
    pub async fn headless_start(&mut self, initial_message: String) -> TurnOutcome {
        self.messages.push(Message::user(initial_message));
        let outcome = self.process_turn().await;
        self.prompt.close();
        outcome
    }

    /// Run one request against the whole history.
    ///
    /// Only a completed reply is added to the history, a failed or interrupted
    /// turn leaves the user message unanswered.
    async fn process_turn(&mut self) -> TurnOutcome {
        let request_id = match self
            .broker
            .start(&self.messages, &self.options, &self.api_key)
        {
            Ok(request_id) => request_id,
            Err(e) => {
                let message = e.to_string();
                self.prompt.render_error(&message);
                return TurnOutcome::Failed(message);
            }
        };

        self.prompt.show_busy();
        let outcome = self.await_reply(request_id).await;
        self.prompt.hide_busy();
        outcome
    }

    async fn await_reply(&mut self, request_id: RequestId) -> TurnOutcome {
        let mut interrupted = (self.interrupt)();
        let mut reply = String::new();

        loop {
            let event = tokio::select! {
                event = self.events.recv() => event,
                _ = &mut interrupted => {
                    self.broker.cancel(request_id);
                    self.prompt.render_notice("Interrupted, the last message was not answered.");
                    return TurnOutcome::Interrupted;
                }
            };

            let Some(event) = event else {
                let message = "event channel closed".to_string();
                self.prompt.render_error(&message);
                return TurnOutcome::Failed(message);
            };
            if event.request_id() != request_id {
                tracing::debug!(
                    request_id = event.request_id(),
                    "skipping event for another request"
                );
                continue;
            }

            match event {
                ChatEvent::Chunk { text, .. } => {
                    self.prompt.render_chunk(&text);
                    reply.push_str(&text);
                }
                ChatEvent::Complete { .. } => {
                    self.prompt.end_reply();
                    self.messages.push(Message::assistant(reply));
                    return TurnOutcome::Completed;
                }
                ChatEvent::Error { message, .. } => {
                    self.prompt.render_error(&message);
                    return TurnOutcome::Failed(message);
                }
            }
        }
    }
}

fn ctrl_c() -> BoxFuture<'static, ()> {
    Box::pin(async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
}
