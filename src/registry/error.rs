//! Registry error types
//!
//! Error types for connection registry operations.

use super::connection::ConnectionId;

/// Error type for registry control operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The connection handle is not (or no longer) active
    #[error("invalid connection: {0} is not active")]
    InvalidConnection(ConnectionId),
}

/// A failed delivery to a single subscriber during fan-out
///
/// Never returned to a publisher. The registry logs it and disconnects the
/// subscriber (or drops the event, see `OverflowPolicy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    /// The subscriber's transport task has gone away
    #[error("subscriber queue closed")]
    QueueClosed,
    /// The subscriber is not draining its queue fast enough
    #[error("subscriber queue full")]
    QueueFull,
}
