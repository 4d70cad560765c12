//! Catalog service client trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::ItemId;

use crate::error::CheckoutError;

/// Trait for catalog availability checks and reservation release.
///
/// The catalog holds no true per-checkout reservation; availability is a
/// read-only check and `release_reservation` is a notification the catalog
/// treats as a no-op when nothing was reserved. Callers may therefore
/// invoke it unconditionally during rollback.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns true if the item exists and is currently purchasable.
    async fn is_item_available(&self, item_id: ItemId) -> Result<bool, CheckoutError>;

    /// Notifies the catalog that any reservation side effect for these
    /// items can be released. Idempotent.
    async fn release_reservation(&self, item_ids: &[ItemId]) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    published: HashSet<ItemId>,
    released: Vec<ItemId>,
    fail_on_lookup: bool,
    fail_on_release: bool,
}

/// In-memory catalog service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    /// Creates a new in-memory catalog service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an item as published and purchasable.
    pub fn publish(&self, item_id: ItemId) {
        self.state.write().unwrap().published.insert(item_id);
    }

    /// Removes an item from sale.
    pub fn unpublish(&self, item_id: ItemId) {
        self.state.write().unwrap().published.remove(&item_id);
    }

    /// Configures the service to fail availability lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }

    /// Configures the service to fail release calls.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state.write().unwrap().fail_on_release = fail;
    }

    /// Returns how many item releases have been received.
    pub fn released_count(&self) -> usize {
        self.state.read().unwrap().released.len()
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn is_item_available(&self, item_id: ItemId) -> Result<bool, CheckoutError> {
        let state = self.state.read().unwrap();

        if state.fail_on_lookup {
            return Err(CheckoutError::CatalogService(
                "catalog service unreachable".to_string(),
            ));
        }

        Ok(state.published.contains(&item_id))
    }

    async fn release_reservation(&self, item_ids: &[ItemId]) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_release {
            return Err(CheckoutError::CatalogService(
                "catalog service unreachable".to_string(),
            ));
        }

        state.released.extend_from_slice(item_ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_published_item_is_available() {
        let service = InMemoryCatalogService::new();
        let item = ItemId::new(7);
        service.publish(item);

        assert!(service.is_item_available(item).await.unwrap());
        assert!(!service.is_item_available(ItemId::new(8)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unpublish_removes_availability() {
        let service = InMemoryCatalogService::new();
        let item = ItemId::new(7);
        service.publish(item);
        service.unpublish(item);

        assert!(!service.is_item_available(item).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_records_items() {
        let service = InMemoryCatalogService::new();
        service
            .release_reservation(&[ItemId::new(1), ItemId::new(2)])
            .await
            .unwrap();

        assert_eq!(service.released_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_switches() {
        let service = InMemoryCatalogService::new();
        service.set_fail_on_lookup(true);
        assert!(service.is_item_available(ItemId::new(1)).await.is_err());

        service.set_fail_on_lookup(false);
        service.set_fail_on_release(true);
        assert!(service.release_reservation(&[ItemId::new(1)]).await.is_err());
        assert_eq!(service.released_count(), 0);
    }
}
