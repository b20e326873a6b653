//! Document store collaborator
//!
//! The write path only needs insert/update/delete by id. `MemoryStore` keeps
//! documents in process memory, one map per collection.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Field holding a document's identifier
pub const ID_FIELD: &str = "id";

/// Error type for document store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("document {id} already exists in {collection}")]
    AlreadyExists { collection: String, id: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Storage backend for documents
pub trait DocumentStore: Send + Sync {
    /// Insert a document, assigning an id if it has none; returns the stored document
    fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError>;

    /// Fetch a document by id
    fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Merge `delta`'s top-level fields into a document; returns the updated document
    fn update(&self, collection: &str, id: &str, delta: &Value) -> Result<Value, StoreError>;

    /// Delete a document by id
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<String, Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Read the id of a document, generating one when absent
fn document_id(document: &mut Map<String, Value>) -> Result<String, StoreError> {
    match document.get(ID_FIELD) {
        Some(Value::String(id)) if id.is_empty() => Err(StoreError::InvalidDocument(format!(
            "`{ID_FIELD}` must not be empty"
        ))),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        None | Some(Value::Null) => {
            let id = uuid::Uuid::new_v4().to_string();
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
        Some(other) => Err(StoreError::InvalidDocument(format!(
            "`{ID_FIELD}` must be a string or number, got {other}"
        ))),
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument(format!(
            "{what} must be a JSON object"
        ))),
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        let mut document = into_object(document, "document")?;
        let id = document_id(&mut document)?;

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        docs.insert(id.clone(), document.clone());

        tracing::debug!(collection = collection, id = %id, "Document inserted");
        Ok(Value::Object(document))
    }

    fn get(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
            .map(Value::Object)
            .ok_or_else(|| Self::not_found(collection, id))
    }

    fn update(&self, collection: &str, id: &str, delta: &Value) -> Result<Value, StoreError> {
        let Value::Object(fields) = delta else {
            return Err(StoreError::InvalidDocument(
                "update must be a JSON object".to_string(),
            ));
        };

        let mut docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let document = docs
            .get_mut(id)
            .ok_or_else(|| Self::not_found(collection, id))?;

        for (key, value) in fields {
            // The id is immutable
            if key != ID_FIELD {
                document.insert(key.clone(), value.clone());
            }
        }

        tracing::debug!(collection = collection, id = id, "Document updated");
        Ok(Value::Object(document.clone()))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = self
            .collections
            .get_mut(collection)
            .and_then(|mut docs| docs.remove(id));

        match removed {
            Some(_) => {
                tracing::debug!(collection = collection, id = id, "Document deleted");
                Ok(())
            }
            None => Err(Self::not_found(collection, id)),
        }
    }
}
