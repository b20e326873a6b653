//! Document writes that notify subscribers
//!
//! Each operation mutates the store first and publishes to the registry only
//! once the mutation has succeeded. Publishing never fails the write.

use std::sync::Arc;

use serde_json::Value;

use super::store::{DocumentStore, StoreError, ID_FIELD};
use crate::registry::{ChannelName, Event, Registry};

/// Write path over a document store and the connection registry
#[derive(Clone)]
pub struct DataOperations {
    store: Arc<dyn DocumentStore>,
    registry: Arc<Registry>,
}

impl DataOperations {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Fetch a document; reads publish nothing
    pub fn get_document(
        &self,
        channel: &ChannelName,
        document_id: &str,
    ) -> Result<Value, StoreError> {
        self.store.get(channel.as_str(), document_id)
    }

    /// Create a document and publish a `create` event
    pub async fn create_document(
        &self,
        channel: &ChannelName,
        document: Value,
    ) -> Result<Value, StoreError> {
        let stored = self.store.insert(channel.as_str(), document)?;
        self.registry
            .publish(channel.clone(), Event::create(stored.clone()))
            .await;
        Ok(stored)
    }

    /// Apply an update delta and publish an `update` event carrying the delta
    ///
    /// The id is immutable, so an `id` key in the delta is neither stored nor
    /// published.
    pub async fn update_document(
        &self,
        channel: &ChannelName,
        document_id: &str,
        mut update: Value,
    ) -> Result<Value, StoreError> {
        if let Value::Object(fields) = &mut update {
            fields.remove(ID_FIELD);
        }
        let updated = self.store.update(channel.as_str(), document_id, &update)?;
        self.registry
            .publish(channel.clone(), Event::update(document_id, update))
            .await;
        Ok(updated)
    }

    /// Delete a document and publish a `delete` event
    pub async fn delete_document(
        &self,
        channel: &ChannelName,
        document_id: &str,
    ) -> Result<(), StoreError> {
        self.store.delete(channel.as_str(), document_id)?;
        self.registry
            .publish(channel.clone(), Event::delete(document_id))
            .await;
        Ok(())
    }
}
