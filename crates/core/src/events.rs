//! Event System
//!
//! Provides a pub/sub event bus that propagates device list changes to
//! open connections, e.g. clients waiting on `host:track-devices`.

use parking_lot::RwLock;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::config::DeviceStatus;

/// Events emitted by the server's device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A device was attached
    Attached { serial: String },
    /// A device was detached
    Detached { serial: String },
    /// A device changed status
    StatusChanged { serial: String, status: DeviceStatus },
    /// The server is shutting down
    ServerStopping,
}

/// Subscriber handle for receiving events
pub struct EventSubscription {
    receiver: UnboundedReceiver<DeviceEvent>,
}

impl EventSubscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<DeviceEvent> {
        self.receiver.recv().await
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&mut self) -> Option<DeviceEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<UnboundedSender<DeviceEvent>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.write().push(sender);
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: DeviceEvent) -> usize {
        let subscribers = self.subscribers.read();
        let mut delivered = 0;

        for sender in subscribers.iter() {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!("Event {:?} delivered to {} subscribers", event, delivered);
        delivered
    }

    /// Get the number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Drop senders whose subscription has been dropped
    pub fn cleanup(&self) {
        self.subscribers.write().retain(|s| !s.is_closed());
    }

    /// Disconnect every subscriber; pending `recv` calls return `None`
    pub fn close(&self) {
        self.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
