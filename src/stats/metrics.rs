//! Statistics and metrics for the connection registry

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::registry::ChannelName;

/// Lock-free counters updated by the registry
#[derive(Debug)]
pub struct RegistryMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    events_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    dropped_events: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deliveries(&self, count: u64) {
        self.deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Build a snapshot combining these counters with live gauges
    pub fn snapshot(
        &self,
        active_connections: usize,
        channel_count: usize,
        subscriptions: usize,
    ) -> RegistryStats {
        RegistryStats {
            active_connections: active_connections as u64,
            channel_count: channel_count as u64,
            subscriptions: subscriptions as u64,
            total_connections: self.total_connections.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry-wide statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Currently connected clients
    pub active_connections: u64,
    /// Channels with at least one subscriber
    pub channel_count: u64,
    /// Total (connection, channel) pairs
    pub subscriptions: u64,
    /// Connections ever registered
    pub total_connections: u64,
    /// Calls to `publish`
    pub events_published: u64,
    /// Notifications enqueued to subscribers
    pub deliveries: u64,
    /// Subscribers disconnected because delivery failed
    pub delivery_failures: u64,
    /// Notifications dropped for a full queue (drop-event policy)
    pub dropped_events: u64,
    /// Time since the registry was created
    #[serde(serialize_with = "serialize_secs")]
    pub uptime: Duration,
}

/// Statistics for one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub channel: ChannelName,
    pub subscriber_count: usize,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let stats = RegistryMetrics::new().snapshot(0, 0, 0);
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.events_published, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.delivery_failures, 0);
        assert_eq!(stats.dropped_events, 0);
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = RegistryMetrics::new();
        metrics.record_connection();
        metrics.record_connection();
        metrics.record_publish();
        metrics.record_deliveries(3);
        metrics.record_delivery_failure();
        metrics.record_dropped_event();

        let stats = metrics.snapshot(2, 1, 4);
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.channel_count, 1);
        assert_eq!(stats.subscriptions, 4);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.deliveries, 3);
        assert_eq!(stats.delivery_failures, 1);
        assert_eq!(stats.dropped_events, 1);
    }

    #[test]
    fn test_stats_serialize_uptime_as_seconds() {
        let stats = RegistryStats {
            uptime: Duration::from_millis(2500),
            ..Default::default()
        };

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["uptime"], 2);
    }
}
