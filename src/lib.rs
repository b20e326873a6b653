//! Real-time channel fan-out for document change notifications
//!
//! Clients open a WebSocket on `/ws/{project_id}/{collection}` and receive a
//! JSON message for every document created, updated or deleted in that
//! collection.
//!
//! ```no_run
//! use fanout_rs::{RealtimeServer, ServerConfig};
//!
//! # async fn run() -> fanout_rs::Result<()> {
//! let server = RealtimeServer::new(ServerConfig::default());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```
//!
//! The [`registry::Registry`] can also be used on its own:
//!
//! ```
//! use fanout_rs::registry::{Event, Registry};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let registry = Registry::new();
//! let mut client = registry.connect().await;
//! registry.subscribe(client.id(), "notes").await.unwrap();
//!
//! registry.publish("notes", Event::create(json!({"id": "1"}))).await;
//! assert_eq!(client.recv().await.unwrap().event, Event::create(json!({"id": "1"})));
//! # });
//! ```

pub mod data;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{ChannelName, Connection, ConnectionId, Event, Registry, RegistryConfig};
pub use server::{RealtimeServer, ServerConfig};
