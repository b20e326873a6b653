//! Connection registry for channel pub/sub
//!
//! The registry tracks live connections, the channels each one is subscribed
//! to, and fans out published events to every subscriber of a channel.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<Registry>
//!                 ┌──────────────────────────────────┐
//!                 │ RwLock<RegistryState {           │
//!                 │   connections: Id -> Entry {tx}, │
//!                 │   channels: Name -> {Id},        │
//!                 │ }>                               │
//!                 └────────────────┬─────────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!   [Write path]            [WebSocket task]         [WebSocket task]
//!   publish(ch, event)      connection.recv()        connection.recv()
//!         │                        │                        │
//!         └──► try_send(Arc<Notification>) ──► queue ──► socket
//! ```
//!
//! # Delivery
//!
//! Every connection owns a bounded queue. `publish` snapshots the subscriber
//! set under the read lock, then enqueues without waiting, so a slow
//! subscriber never stalls the others. The event is JSON-encoded once into
//! `bytes::Bytes` and shared by all subscribers.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod store;

pub use config::{OverflowPolicy, RegistryConfig};
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use error::{DeliveryFailure, RegistryError};
pub use event::{Action, ChannelName, Event, Notification};
pub use store::Registry;
