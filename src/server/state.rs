//! Shared state handed to every HTTP and WebSocket handler

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::ServerConfig;
use super::error::ApiError;
use crate::data::DataOperations;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub data: DataOperations,
    pub config: Arc<ServerConfig>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, data: DataOperations, config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            registry,
            data,
            config: Arc::new(config),
            connection_semaphore,
        }
    }

    /// Reserve a connection slot
    ///
    /// Returns `None` when connections are unlimited. The slot is released
    /// when the permit is dropped.
    pub fn try_admit(&self) -> Result<Option<OwnedSemaphorePermit>, ApiError> {
        match self.connection_semaphore {
            Some(ref sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(_) => Err(ApiError::service_unavailable("connection limit reached")),
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::data::MemoryStore;

    fn state(max_connections: usize) -> AppState {
        let registry = Arc::new(Registry::new());
        let data = DataOperations::new(Arc::new(MemoryStore::new()), Arc::clone(&registry));
        AppState::new(registry, data, ServerConfig::default().max_connections(max_connections))
    }

    #[test]
    fn test_unlimited_connections() {
        let state = state(0);

        for _ in 0..100 {
            assert!(state.try_admit().unwrap().is_none());
        }
    }

    #[test]
    fn test_connection_limit() {
        let state = state(2);

        let first = state.try_admit().unwrap();
        let _second = state.try_admit().unwrap();
        let rejected = state.try_admit().unwrap_err();
        assert_eq!(rejected.status, StatusCode::SERVICE_UNAVAILABLE);

        // Releasing a slot admits the next client
        drop(first);
        assert!(state.try_admit().unwrap().is_some());
    }
}
