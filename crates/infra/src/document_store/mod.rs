//! Document store boundary.
//!
//! The real document database is an external collaborator; this module pins
//! down the extension points the id glue plugs into (serializer, identity
//! convention, id generator, lifecycle events) and ships an in-memory store
//! that drives them the same way, for tests and local development.

pub mod in_memory;
pub mod session;

use std::any::Any;

use thiserror::Error;

use docid_core::{IdError, TypeKey};

use crate::serialization::DocumentBody;

pub use in_memory::InMemoryDocumentStore;
pub use session::{DocumentSession, IncludeLoader, Query};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Identifier conversion failed (schema/programming error).
    #[error(transparent)]
    Id(#[from] IdError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entities must serialize to JSON objects.
    #[error("document must serialize to an object, got {0}")]
    NotAnObject(&'static str),

    /// The stored document belongs to another collection.
    #[error("document '{key}' is in collection '{found}', expected '{expected}'")]
    CollectionMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The session ran out of its request budget.
    #[error("session exceeded the maximum of {max} requests")]
    TooManyRequests { max: usize },

    #[error("document store lock poisoned")]
    Poisoned,
}

/// A stored document: its collection plus the JSON body (key excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: &'static str,
    pub body: DocumentBody,
}

/// Raised before an entity is serialized for storage.
pub struct BeforeStore<'a> {
    pub document_id: &'a str,
    pub entity_type: TypeKey,
    pub entity: &'a mut dyn Any,
}

/// Raised after a document body has been turned back into an entity.
pub struct AfterConversionToEntity<'a> {
    pub id: &'a str,
    pub entity_type: TypeKey,
    pub entity: &'a mut dyn Any,
}

pub type BeforeStoreHandler =
    Box<dyn Fn(&mut BeforeStore<'_>) -> Result<(), StoreError> + Send + Sync>;

pub type AfterConversionHandler =
    Box<dyn Fn(&mut AfterConversionToEntity<'_>) -> Result<(), StoreError> + Send + Sync>;
