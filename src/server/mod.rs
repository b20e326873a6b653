//! HTTP and WebSocket front end
//!
//! Exposes the registry to clients (`/ws/{project_id}/{collection}`) and the
//! document write path to HTTP callers.

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use listener::RealtimeServer;
pub use state::AppState;
