//! `docid-core` — strongly typed identifiers and their runtime registry.
//!
//! This crate has no storage concerns: it only knows how to recognise
//! identifier and entity types, build ids from raw values, and convert ids
//! to and from JSON tokens.

pub mod entity;
pub mod error;
pub mod id;
pub mod json;
pub mod registry;

pub use entity::{Entity, ID_PROPERTY, MemberDescriptor, TypeKey};
pub use error::{IdError, IdResult};
pub use id::{AnyId, DynId, StronglyTypedId, new_unique_key};
pub use json::{IdJsonConverter, JsonConverter};
pub use registry::{IdFactory, IdProperty, IdRegistry, IdRegistryBuilder};
