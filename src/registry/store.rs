//! Connection registry implementation
//!
//! The central registry that tracks live connections and their channel
//! subscriptions, and fans out published events to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::config::{OverflowPolicy, RegistryConfig};
use super::connection::{deliver, Connection, ConnectionEntry, ConnectionId, ConnectionState};
use super::error::{DeliveryFailure, RegistryError};
use super::event::{ChannelName, Event, Notification};
use crate::stats::{ChannelStats, RegistryMetrics, RegistryStats};

/// Shared mutable state; always accessed under one lock
#[derive(Default)]
struct RegistryState {
    /// Active connections
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Channel name to subscriber set
    channels: HashMap<ChannelName, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn remove_subscription(&mut self, id: ConnectionId, channel: &ChannelName) -> bool {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return false;
        };
        let removed = subscribers.remove(&id);
        if subscribers.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }
}

/// Central registry for all live connections
///
/// Thread-safe via a single `RwLock` guarding both the active-connection set
/// and the channel map. Publishing only holds the read lock long enough to
/// snapshot the subscriber queues.
pub struct Registry {
    state: RwLock<RegistryState>,

    next_connection_id: AtomicU64,

    metrics: RegistryMetrics,

    /// Configuration
    config: RegistryConfig,
}

impl Registry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_connection_id: AtomicU64::new(1),
            metrics: RegistryMetrics::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new connection
    ///
    /// Always succeeds. The returned handle receives every event published to
    /// the channels it later subscribes to.
    pub async fn connect(&self) -> Connection {
        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.subscriber_queue_capacity);

        let mut state = self.state.write().await;
        state.connections.insert(id, ConnectionEntry::new(tx));
        self.metrics.record_connection();

        tracing::info!(
            connection_id = %id,
            connections = state.connections.len(),
            "Connection registered"
        );

        Connection::new(id, rx)
    }

    /// Subscribe a connection to a channel
    ///
    /// Creates the channel if absent. Subscribing twice is a no-op.
    pub async fn subscribe(
        &self,
        id: ConnectionId,
        channel: impl Into<ChannelName>,
    ) -> Result<(), RegistryError> {
        let channel = channel.into();
        let mut state = self.state.write().await;

        let entry = state
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::InvalidConnection(id))?;

        if !entry.channels.insert(channel.clone()) {
            return Ok(());
        }

        let subscribers = state.channels.entry(channel.clone()).or_default();
        subscribers.insert(id);

        tracing::debug!(
            connection_id = %id,
            channel = %channel,
            subscribers = subscribers.len(),
            "Subscriber added"
        );

        Ok(())
    }

    /// Unsubscribe a connection from a channel
    ///
    /// Unsubscribing from a channel the connection is not in is a no-op.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        channel: impl Into<ChannelName>,
    ) -> Result<(), RegistryError> {
        let channel = channel.into();
        let mut state = self.state.write().await;

        let entry = state
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::InvalidConnection(id))?;

        if entry.channels.remove(&channel) {
            state.remove_subscription(id, &channel);
            tracing::debug!(connection_id = %id, channel = %channel, "Subscriber removed");
        }

        Ok(())
    }

    /// Publish an event to every current subscriber of a channel
    ///
    /// Best-effort: never fails. A subscriber whose queue is closed (or full,
    /// under `OverflowPolicy::Disconnect`) is disconnected; delivery to the
    /// remaining subscribers continues.
    pub async fn publish(&self, channel: impl Into<ChannelName>, event: Event) {
        let channel = channel.into();
        self.metrics.record_publish();

        let targets: Vec<_> = {
            let state = self.state.read().await;
            match state.channels.get(&channel) {
                Some(subscribers) => subscribers
                    .iter()
                    .filter_map(|id| state.connections.get(id).map(|e| (*id, e.sender())))
                    .collect(),
                None => Vec::new(),
            }
        };

        if targets.is_empty() {
            tracing::trace!(channel = %channel, action = event.action().as_str(), "No subscribers");
            return;
        }

        let notification = match Notification::encode(channel.clone(), event) {
            Ok(notification) => Arc::new(notification),
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Failed to encode event");
                return;
            }
        };

        let mut delivered = 0u64;
        let mut failed = Vec::new();

        for (id, tx) in &targets {
            match deliver(tx, Arc::clone(&notification)) {
                Ok(()) => delivered += 1,
                Err(DeliveryFailure::QueueFull)
                    if self.config.overflow_policy == OverflowPolicy::DropEvent =>
                {
                    self.metrics.record_dropped_event();
                    tracing::warn!(
                        connection_id = %id,
                        channel = %channel,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(failure) => failed.push((*id, failure)),
            }
        }

        self.metrics.record_deliveries(delivered);

        tracing::debug!(
            channel = %channel,
            action = notification.event.action().as_str(),
            subscribers = targets.len(),
            delivered = delivered,
            "Event published"
        );

        for (id, failure) in failed {
            self.metrics.record_delivery_failure();
            tracing::warn!(
                connection_id = %id,
                channel = %channel,
                error = %failure,
                "Delivery failed, disconnecting subscriber"
            );
            self.disconnect(id).await;
        }
    }

    /// Remove a connection and all its subscriptions
    ///
    /// Disconnecting an unknown or already disconnected connection is a no-op.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut state = self.state.write().await;

        let Some(entry) = state.connections.remove(&id) else {
            return;
        };

        for channel in &entry.channels {
            state.remove_subscription(id, channel);
        }

        tracing::info!(
            connection_id = %id,
            channels = entry.channels.len(),
            duration_secs = entry.connected_at.elapsed().as_secs(),
            connections = state.connections.len(),
            "Connection removed"
        );
    }

    /// Check whether a connection is active
    pub async fn is_active(&self, id: ConnectionId) -> bool {
        self.state.read().await.connections.contains_key(&id)
    }

    /// Get the lifecycle state of a connection
    pub async fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        if self.is_active(id).await {
            ConnectionState::Active
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Get the current subscribers of a channel
    pub async fn subscribers(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        let mut ids: Vec<_> = state
            .channels
            .get(channel)
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Get the channels a connection is subscribed to
    pub async fn channels_of(&self, id: ConnectionId) -> Vec<ChannelName> {
        let state = self.state.read().await;
        let mut channels: Vec<_> = state
            .connections
            .get(&id)
            .map(|entry| entry.channels.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Get number of active connections
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Get number of channels with at least one subscriber
    pub async fn channel_count(&self) -> usize {
        self.state.read().await.channels.len()
    }

    /// Get statistics for one channel
    pub async fn channel_stats(&self, channel: &ChannelName) -> ChannelStats {
        let state = self.state.read().await;
        ChannelStats {
            channel: channel.clone(),
            subscriber_count: state.channels.get(channel).map_or(0, HashSet::len),
        }
    }

    /// Get registry-wide statistics
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        let subscriptions = state.channels.values().map(HashSet::len).sum();
        self.metrics
            .snapshot(state.connections.len(), state.channels.len(), subscriptions)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
