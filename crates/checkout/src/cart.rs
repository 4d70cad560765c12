//! Cart snapshot handed to the orchestrator by the cart service.

use common::{BuyerId, CartId, ItemId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Errors describing an invalid cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The cart has no line items.
    #[error("cart is empty")]
    Empty,

    /// A line item has quantity zero.
    #[error("item {0} has zero quantity")]
    ZeroQuantity(ItemId),

    /// A line item has a non-positive unit price.
    #[error("item {0} has a non-positive unit price")]
    NonPositivePrice(ItemId),
}

/// One line in a cart: an item and how many of it are being bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The catalog item being purchased.
    pub item_id: ItemId,
    /// Display name, copied from the catalog at add-to-cart time.
    pub name: String,
    /// Price per unit.
    pub unit_price: Money,
    /// Units purchased, at least 1 in a valid cart.
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(item_id: ItemId, name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            item_id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// The derived price for this line: unit price times quantity.
    pub fn line_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Immutable snapshot of a cart at the moment checkout begins.
///
/// The cart itself lives in the cart service; the orchestrator only ever
/// sees this frozen copy and never writes back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Reference to the cart this snapshot was taken from.
    pub cart_id: CartId,
    /// The buyer who owns the cart.
    pub buyer_id: BuyerId,
    /// Line items, in the order they were added.
    pub items: Vec<LineItem>,
}

impl CartSnapshot {
    /// Creates a new cart snapshot.
    pub fn new(cart_id: CartId, buyer_id: BuyerId, items: Vec<LineItem>) -> Self {
        Self {
            cart_id,
            buyer_id,
            items,
        }
    }

    /// The total price across all lines.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(LineItem::line_price).sum()
    }

    /// Number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Distinct item ids in first-seen order, for one-lookup-per-item calls.
    pub fn distinct_item_ids(&self) -> Vec<ItemId> {
        let mut seen = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.item_id) {
                seen.push(item.item_id);
            }
        }
        seen
    }

    /// Checks the snapshot invariants: non-empty, every quantity at least 1,
    /// every unit price positive.
    pub fn validate(&self) -> Result<(), CartError> {
        if self.items.is_empty() {
            return Err(CartError::Empty);
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(CartError::ZeroQuantity(item.item_id));
            }
            if !item.unit_price.is_positive() {
                return Err(CartError::NonPositivePrice(item.item_id));
            }
        }
        Ok(())
    }
}
