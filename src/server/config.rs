//! Server configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::registry::{OverflowPolicy, RegistryConfig};

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 8000;

/// Prefix of environment variables read by [`ServerConfig::load`]
pub const ENV_PREFIX: &str = "FANOUT";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent WebSocket connections (0 = unlimited)
    pub max_connections: usize,

    /// Interval between keep-alive pings sent to each client
    pub ping_interval: Duration,

    /// Maximum size of an inbound WebSocket message
    pub max_message_size: usize,

    /// Connection registry settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            ping_interval: Duration::from_secs(30),
            max_message_size: 64 * 1024, // 64KB
            registry: RegistryConfig::default(),
        }
    }
}

/// Overrides read from a config file or the environment
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    bind_addr: Option<SocketAddr>,
    max_connections: Option<usize>,
    ping_interval_secs: Option<u64>,
    max_message_size: Option<usize>,
    queue_capacity: Option<usize>,
    overflow_policy: Option<OverflowPolicy>,
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Load defaults overridden by an optional TOML file, then by
    /// `FANOUT_*` environment variables
    ///
    /// Recognized keys: `bind_addr`, `max_connections`, `ping_interval_secs`,
    /// `max_message_size`, `queue_capacity`, `overflow_policy`
    /// (`"disconnect"` or `"drop-event"`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, ::config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: Option<&Path>, env: ::config::Environment) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(env.try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(Self::default().apply(settings))
    }

    fn apply(mut self, settings: Settings) -> Self {
        if let Some(addr) = settings.bind_addr {
            self = self.bind(addr);
        }
        if let Some(max) = settings.max_connections {
            self = self.max_connections(max);
        }
        if let Some(secs) = settings.ping_interval_secs {
            self = self.ping_interval(Duration::from_secs(secs));
        }
        if let Some(size) = settings.max_message_size {
            self.max_message_size = size;
        }
        if let Some(capacity) = settings.queue_capacity {
            self.registry = self.registry.subscriber_queue_capacity(capacity);
        }
        if let Some(policy) = settings.overflow_policy {
            self.registry = self.registry.overflow_policy(policy);
        }
        self
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the keep-alive ping interval (minimum one second)
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Set registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}
