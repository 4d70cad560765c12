//! Shared identifier types used across the checkout platform crates.

pub mod types;

pub use types::{BuyerId, CartId, ItemId, TransactionId};
