//! Change notification.
//!
//! The core only announces what happened; delivering it to clients (HTTP
//! streams, push messages) belongs to whoever subscribes.

use common::OrderId;
use order_store::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::order::OrderEvent;

/// One change to one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersChanged {
    pub order_id: OrderId,
    /// Version of the order after the change. For removals, the last stored
    /// version.
    pub version: Version,
    pub event: OrderEvent,
}

/// Receives every successful order mutation.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, change: OrdersChanged);
}

/// Discards all changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self, _change: OrdersChanged) {}
}

/// Fans changes out to any number of subscribers.
///
/// Slow subscribers lose the oldest changes once `capacity` is exceeded
/// and see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<OrdersChanged>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrdersChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify(&self, change: OrdersChanged) {
        // no subscribers is fine
        if self.sender.send(change).is_err() {
            tracing::trace!("order change dropped, nobody listening");
        }
    }
}
