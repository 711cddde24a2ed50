//! Sales domain module.
//!
//! Orders reference customers and products by their typed ids only; loading
//! the referenced documents is the store's job.

pub mod order;

pub use order::{Order, OrderId, OrderLine, OrderStatus, register};
