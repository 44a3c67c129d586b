// Event Bus - outbound notification fabric
//
// In-memory pub/sub over a tokio broadcast channel. Events are lost on
// restart; durable delivery belongs to an external consumer that
// subscribes and persists.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::SandboxEvent;

/// Publishes [`SandboxEvent`]s to all current subscribers.
///
/// Delivery ordering is only guaranteed per entity; consumers must not
/// assume cross-entity ordering.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SandboxEvent>>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    /// before old ones are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: SandboxEvent) {
        debug!(entity = %event.entity_id(), "publishing event: {:?}", event);
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("no subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<SandboxEvent>,
}

impl EventReceiver {
    /// Receive the next event, waiting until one is available.
    pub async fn recv(&mut self) -> Result<SandboxEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<SandboxEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,

    #[error("no events available")]
    Empty,

    #[error("receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
