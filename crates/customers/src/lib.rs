//! Customers domain module.

pub mod customer;

pub use customer::{Customer, CustomerId, register};
