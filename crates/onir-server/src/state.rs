use std::sync::Arc;

use onir::{models::event::ChatEvent, Broker, EventReceiver};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Events buffered per subscriber before it starts lagging
const EVENT_BUFFER: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub events: broadcast::Sender<ChatEvent>,
    /// Fallback credential for requests that do not send one
    pub api_key: Option<String>,
    /// Fired on shutdown so open event streams end
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wrap the broker and start fanning its events out to subscribers
    pub fn new(broker: Broker, rx: EventReceiver, api_key: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        tokio::spawn(forward_events(rx, events.clone()));
        Self {
            broker: Arc::new(broker),
            events,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            shutdown: CancellationToken::new(),
        }
    }
}

async fn forward_events(mut rx: EventReceiver, events: broadcast::Sender<ChatEvent>) {
    while let Some(event) = rx.recv().await {
        // No window is listening, same as a destroyed renderer
        if events.send(event).is_err() {
            tracing::debug!("no event subscribers, dropping event");
        }
    }
    tracing::debug!("broker event channel closed");
}

#[cfg(test)]
impl AppState {
    pub fn with_mock(factory: onir::providers::mock::MockFactory, api_key: Option<&str>) -> Self {
        let (broker, rx) = Broker::new(Arc::new(factory));
        Self::new(broker, rx, api_key.map(String::from))
    }
}
