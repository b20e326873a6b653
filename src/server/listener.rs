//! Realtime server listener
//!
//! Binds the TCP listener and serves the HTTP/WebSocket router.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::data::{DataOperations, DocumentStore, MemoryStore};
use crate::error::Result;
use crate::registry::Registry;
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::server::state::AppState;

/// Realtime server
///
/// Owns the single [`Registry`] of the process and shares it with the
/// WebSocket endpoint and the document write path.
pub struct RealtimeServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    data: DataOperations,
}

impl RealtimeServer {
    /// Create a new server backed by an in-memory document store
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Create a new server with a custom document store
    pub fn with_store(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        let registry = Arc::new(Registry::with_config(config.registry.clone()));
        let data = DataOperations::new(store, Arc::clone(&registry));

        Self {
            config,
            registry,
            data,
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the document write path
    pub fn data(&self) -> &DataOperations {
        &self.data
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the router for this server
    pub fn router(&self) -> Router {
        routes::router(AppState::new(
            Arc::clone(&self.registry),
            self.data.clone(),
            self.config.clone(),
        ))
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "Realtime server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }
}
