//! Registry statistics

pub mod metrics;

pub use metrics::{ChannelStats, RegistryMetrics, RegistryStats};
