//! Document write path
//!
//! The store is a collaborator of the registry: writes go to the store and,
//! when they succeed, are announced to subscribers of the collection channel.

pub mod operations;
pub mod store;

pub use operations::DataOperations;
pub use store::{DocumentStore, MemoryStore, StoreError, ID_FIELD};
