//! Registry configuration

use serde::Deserialize;

/// What to do when a subscriber's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Treat the subscriber as failed and disconnect it
    #[default]
    Disconnect,
    /// Drop the event for that subscriber only and keep it subscribed
    DropEvent,
}

/// Configuration for the connection registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each connection's outbound queue
    pub subscriber_queue_capacity: usize,

    /// Behavior when a subscriber's queue is full
    pub overflow_policy: OverflowPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: 256,
            overflow_policy: OverflowPolicy::Disconnect,
        }
    }
}

impl RegistryConfig {
    /// Set the per-connection queue capacity (minimum 1)
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}
