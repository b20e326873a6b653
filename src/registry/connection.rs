//! Connection handles and per-connection state
//!
//! This module defines the handle given to a transport session and the
//! state the registry keeps for each live connection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::error::DeliveryFailure;
use super::event::{ChannelName, Notification};

/// Identity of a connection; unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(super) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered; may subscribe and receive events
    Active,
    /// Removed from the registry (terminal)
    Disconnected,
}

/// Handle to one live connection, held by its transport session
///
/// Owns the receiving end of the connection's outbound queue. `recv` yields
/// `None` once the registry has disconnected the connection and the queue
/// is drained.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    rx: mpsc::Receiver<Arc<Notification>>,
}

impl Connection {
    pub(super) fn new(id: ConnectionId, rx: mpsc::Receiver<Arc<Notification>>) -> Self {
        Self { id, rx }
    }

    /// Get the connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next notification
    pub async fn recv(&mut self) -> Option<Arc<Notification>> {
        self.rx.recv().await
    }

    /// Take a queued notification without waiting
    pub fn try_recv(&mut self) -> Result<Arc<Notification>, TryRecvError> {
        self.rx.try_recv()
    }
}

/// Registry-side state for a single connection
pub(super) struct ConnectionEntry {
    /// Sending end of the outbound queue
    tx: mpsc::Sender<Arc<Notification>>,

    /// Channels this connection is subscribed to (reverse index)
    pub channels: HashSet<ChannelName>,

    /// When the connection was registered
    pub connected_at: Instant,
}

impl ConnectionEntry {
    pub fn new(tx: mpsc::Sender<Arc<Notification>>) -> Self {
        Self {
            tx,
            channels: HashSet::new(),
            connected_at: Instant::now(),
        }
    }

    /// Clone the sender for delivery outside the registry lock
    pub fn sender(&self) -> mpsc::Sender<Arc<Notification>> {
        self.tx.clone()
    }
}

/// Enqueue a notification without waiting
pub(super) fn deliver(
    tx: &mpsc::Sender<Arc<Notification>>,
    notification: Arc<Notification>,
) -> Result<(), DeliveryFailure> {
    tx.try_send(notification).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryFailure::QueueFull,
        TrySendError::Closed(_) => DeliveryFailure::QueueClosed,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::event::Event;

    fn notification() -> Arc<Notification> {
        Arc::new(Notification::encode("notes".into(), Event::create(json!({"id": "1"}))).unwrap())
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_deliver_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);

        assert_eq!(deliver(&tx, notification()), Ok(()));
        assert_eq!(deliver(&tx, notification()), Err(DeliveryFailure::QueueFull));

        // Draining frees the slot again
        assert!(rx.try_recv().is_ok());
        assert_eq!(deliver(&tx, notification()), Ok(()));
    }

    #[test]
    fn test_deliver_closed_queue() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        assert_eq!(
            deliver(&tx, notification()),
            Err(DeliveryFailure::QueueClosed)
        );
    }
}
