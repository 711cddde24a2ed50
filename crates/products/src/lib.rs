//! Products domain module.
//!
//! Catalog entries persisted as documents, keyed by `ProductId`.

pub mod product;

pub use product::{Product, ProductId, register};
