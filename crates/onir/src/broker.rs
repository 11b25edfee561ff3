//! The request broker sits between a UI and the streaming provider.
//!
//! Every accepted chat gets a fresh [`RequestId`] and a cancellation token
//! kept in the registry for as long as the request is in flight. A relay
//! task forwards the provider's stream to the UI as [`ChatEvent`]s tagged
//! with that id. Delivery and cancellation both go through the registry
//! lock, so once [`Broker::cancel`] returns no further event for the id can
//! be emitted, and a request never emits more than one terminal event.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{ChatError, ChatResult};
use crate::models::event::{ChatEvent, StreamEvent};
use crate::models::message::Message;
use crate::models::options::GenerationOptions;
use crate::providers::base::ChatStream;
use crate::providers::factory::ProviderFactory;

/// Correlation key of one chat request. Never reused within a process.
pub type RequestId = u64;

/// Receiving side of the broker's UI-facing event channel
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

type EventSender = mpsc::UnboundedSender<ChatEvent>;

#[derive(Clone, Default)]
struct Registry(Arc<Mutex<HashMap<RequestId, CancellationToken>>>);

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, CancellationToken>> {
        // The map stays consistent even if a holder panicked
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Send `event` if the request is still registered. Terminal events
    /// remove the entry in the same critical section.
    ///
    /// Returns false when the request is gone (cancelled or already finished).
    fn deliver(&self, request_id: RequestId, event: StreamEvent, events: &EventSender) -> bool {
        let mut entries = self.lock();
        if !entries.contains_key(&request_id) {
            return false;
        }
        if event.is_terminal() {
            entries.remove(&request_id);
        }
        if events.send(event.for_request(request_id)).is_err() {
            tracing::debug!(request_id, "event receiver closed, dropping event");
        }
        true
    }
}

pub struct Broker {
    factory: Arc<dyn ProviderFactory>,
    registry: Registry,
    next_id: AtomicU64,
    events: EventSender,
}

impl Broker {
    /// Create a broker and the channel its events are delivered on
    pub fn new(factory: Arc<dyn ProviderFactory>) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let broker = Self {
            factory,
            registry: Registry::default(),
            next_id: AtomicU64::new(1),
            events,
        };
        (broker, rx)
    }

    /// Start streaming a chat completion.
    ///
    /// Returns as soon as the request is set up; its output arrives later on
    /// the event channel. Setup failures are returned here and never produce
    /// an event. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
        credential: &str,
    ) -> ChatResult<RequestId> {
        if messages.is_empty() {
            return Err(ChatError::EmptyConversation);
        }
        if credential.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        let provider = self.factory.create(credential)?;
        let cancel = CancellationToken::new();
        let stream = provider.stream(messages, options, cancel.clone())?;

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().insert(request_id, cancel);
        tracing::info!(request_id, messages = messages.len(), "chat request started");

        tokio::spawn(relay(
            request_id,
            stream,
            self.registry.clone(),
            self.events.clone(),
        ));

        Ok(request_id)
    }

    /// Cancel an in-flight request.
    ///
    /// Unknown, finished or already cancelled ids are ignored. Returns whether
    /// a request was actually cancelled.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let token = self.registry.lock().remove(&request_id);
        match token {
            Some(token) => {
                token.cancel();
                tracing::info!(request_id, "chat request cancelled");
                true
            }
            None => {
                tracing::debug!(request_id, "cancel ignored, request not in flight");
                false
            }
        }
    }

    /// Cancel everything still in flight, returning how many requests were stopped
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.registry.lock().drain().collect();
        for (request_id, token) in &drained {
            token.cancel();
            tracing::info!(request_id = *request_id, "chat request cancelled");
        }
        drained.len()
    }

    pub fn in_flight(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_active(&self, request_id: RequestId) -> bool {
        self.registry.lock().contains_key(&request_id)
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        let cancelled = self.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "broker dropped with requests in flight");
        }
    }
}

async fn relay(
    request_id: RequestId,
    mut stream: ChatStream,
    registry: Registry,
    events: EventSender,
) {
    let mut chunks = 0usize;
    while let Some(event) = stream.next().await {
        let terminal = event.is_terminal();
        match &event {
            StreamEvent::Chunk(_) => chunks += 1,
            StreamEvent::Complete => {
                tracing::info!(request_id, chunks, "chat request completed")
            }
            StreamEvent::Error(message) => {
                tracing::warn!(request_id, chunks, error = %message, "chat request failed")
            }
        }

        if !registry.deliver(request_id, event, &events) {
            tracing::debug!(request_id, "request no longer in flight, stopping relay");
            return;
        }
        if terminal {
            return;
        }
    }

    // A stream that stops on its own must still end with a terminal event;
    // `deliver` is a no-op here if the stop was caused by a cancel.
    let ended = StreamEvent::Error("stream ended without completing".to_string());
    if registry.deliver(request_id, ended, &events) {
        tracing::warn!(request_id, chunks, "provider stream ended without a terminal event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockFactory, MockStep};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn broker_with(scripts: Vec<Vec<MockStep>>) -> (Broker, EventReceiver) {
        Broker::new(Arc::new(MockFactory::new(scripts)))
    }

    fn hello() -> Vec<Message> {
        vec![Message::user("hi")]
    }

    async fn next_event(rx: &mut EventReceiver) -> ChatEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn events_until_terminal(rx: &mut EventReceiver, terminals: usize) -> Vec<ChatEvent> {
        let mut seen = Vec::new();
        let mut remaining = terminals;
        while remaining > 0 {
            let event = next_event(rx).await;
            if event.is_terminal() {
                remaining -= 1;
            }
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_chunks_then_complete() {
        let (broker, mut rx) = broker_with(vec![vec![
            MockStep::chunk("He"),
            MockStep::chunk("llo"),
            MockStep::complete(),
        ]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();

        let events = events_until_terminal(&mut rx, 1).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Chunk {
                    request_id: id,
                    text: "He".to_string()
                },
                ChatEvent::Chunk {
                    request_id: id,
                    text: "llo".to_string()
                },
                ChatEvent::Complete { request_id: id },
            ]
        );
        assert_eq!(broker.in_flight(), 0);
        assert!(!broker.is_active(id));
    }

    #[tokio::test]
    async fn test_request_ids_are_distinct() {
        let (broker, _rx) = broker_with(vec![]);
        let ids: Vec<_> = (0..5)
            .map(|_| {
                broker
                    .start(&hello(), &GenerationOptions::new(), "key")
                    .unwrap()
            })
            .collect();

        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk() {
        let (broker, mut rx) = broker_with(vec![vec![
            MockStep::chunk("never").delayed(Duration::from_millis(200)),
            MockStep::complete(),
        ]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert!(broker.is_active(id));
        assert!(broker.cancel(id));
        assert_eq!(broker.in_flight(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_chunks() {
        let (broker, mut rx) = broker_with(vec![vec![
            MockStep::chunk("first"),
            MockStep::chunk("second").delayed(Duration::from_millis(200)),
            MockStep::complete(),
        ]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            ChatEvent::Chunk {
                request_id: id,
                text: "first".to_string()
            }
        );

        broker.cancel(id);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (broker, mut rx) = broker_with(vec![vec![MockStep::complete()]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert_eq!(next_event(&mut rx).await, ChatEvent::Complete { request_id: id });

        assert!(!broker.cancel(id));
        assert!(!broker.cancel(id));
        assert!(!broker.cancel(9999));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_error_without_chunks() {
        let (broker, mut rx) = broker_with(vec![vec![MockStep::error("connection refused")]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            ChatEvent::Error {
                request_id: id,
                message: "connection refused".to_string()
            }
        );
        assert_eq!(broker.in_flight(), 0);
        assert!(!broker.cancel(id));
    }

    #[tokio::test]
    async fn test_at_most_one_terminal_event() {
        let (broker, mut rx) = broker_with(vec![vec![
            MockStep::chunk("a"),
            MockStep::complete(),
            MockStep::chunk("b"),
            MockStep::error("late"),
        ]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        let events = events_until_terminal(&mut rx, 1).await;
        assert_eq!(events.last(), Some(&ChatEvent::Complete { request_id: id }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_stream_without_terminal_reports_error() {
        let (broker, mut rx) = broker_with(vec![vec![MockStep::chunk("half")]]);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        let events = events_until_terminal(&mut rx, 1).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            ChatEvent::Error { request_id, .. } if *request_id == id
        ));
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_their_order() {
        let step = Duration::from_millis(10);
        let (broker, mut rx) = broker_with(vec![
            vec![
                MockStep::chunk("a1").delayed(step),
                MockStep::chunk("a2").delayed(step),
                MockStep::chunk("a3").delayed(step),
                MockStep::complete(),
            ],
            vec![
                MockStep::chunk("b1"),
                MockStep::chunk("b2").delayed(step * 2),
                MockStep::chunk("b3"),
                MockStep::complete().delayed(step),
            ],
        ]);

        let first = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        let second = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert_ne!(first, second);

        let events = events_until_terminal(&mut rx, 2).await;
        let texts_for = |id: RequestId| -> Vec<String> {
            events
                .iter()
                .filter_map(|event| match event {
                    ChatEvent::Chunk { request_id, text } if *request_id == id => {
                        Some(text.clone())
                    }
                    _ => None,
                })
                .collect()
        };
        assert_eq!(texts_for(first), vec!["a1", "a2", "a3"]);
        assert_eq!(texts_for(second), vec!["b1", "b2", "b3"]);

        for id in [first, second] {
            let last = events.iter().rev().find(|event| event.request_id() == id);
            assert_eq!(last, Some(&ChatEvent::Complete { request_id: id }));
        }
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_setup_errors_are_returned() {
        let (broker, mut rx) = broker_with(vec![]);

        assert_eq!(
            broker.start(&[], &GenerationOptions::new(), "key"),
            Err(ChatError::EmptyConversation)
        );
        assert_eq!(
            broker.start(&hello(), &GenerationOptions::new(), "  "),
            Err(ChatError::MissingCredential)
        );

        let (failing, mut failing_rx) = Broker::new(Arc::new(MockFactory::failing(
            ChatError::Client("no TLS backend".to_string()),
        )));
        assert!(matches!(
            failing.start(&hello(), &GenerationOptions::new(), "key"),
            Err(ChatError::Client(_))
        ));

        assert_eq!(broker.in_flight(), 0);
        assert_eq!(failing.in_flight(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(failing_rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_closed_receiver_still_cleans_up() {
        let (broker, rx) = broker_with(vec![vec![MockStep::chunk("x"), MockStep::complete()]]);
        drop(rx);

        let id = broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        for _ in 0..50 {
            if !broker.is_active(id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let slow = || vec![MockStep::chunk("slow").delayed(Duration::from_secs(5))];
        let (broker, mut rx) = broker_with(vec![slow(), slow()]);

        broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        broker
            .start(&hello(), &GenerationOptions::new(), "key")
            .unwrap();
        assert_eq!(broker.in_flight(), 2);

        assert_eq!(broker.cancel_all(), 2);
        assert_eq!(broker.in_flight(), 0);
        assert_eq!(broker.cancel_all(), 0);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
