//! Infrastructure layer: document store conventions, serialization, and the
//! lifecycle hooks tying strongly typed ids to document keys.

pub mod config;
pub mod conventions;
pub mod document_store;
pub mod serialization;
pub mod test_driver;

pub use config::StoreConfig;
pub use conventions::{
    Conventions, DocumentIdGenerator, EntityIdHooks, IdentityPredicate, UniqueKeyGenerator,
    configure, find_identity_property,
};
pub use document_store::{
    AfterConversionToEntity, BeforeStore, DocumentSession, InMemoryDocumentStore, StoreError,
    StoredDocument,
};
pub use serialization::{
    ContractResolver, DocumentBody, DocumentSerializer, create_custom_json_serialization,
};
pub use test_driver::TestDriver;
