//! Identity service client trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::BuyerId;

use crate::error::CheckoutError;

/// Trait for buyer identity checks.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Returns true if the buyer exists and is not suspended.
    ///
    /// An `Err` means the service could not be reached; how that is
    /// interpreted (fail-open vs fail-closed) is the orchestrator's policy,
    /// not the client's.
    async fn is_buyer_valid(&self, buyer_id: BuyerId) -> Result<bool, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryIdentityState {
    registered: HashSet<BuyerId>,
    suspended: HashSet<BuyerId>,
    unreachable: bool,
}

/// In-memory identity service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityService {
    state: Arc<RwLock<InMemoryIdentityState>>,
}

impl InMemoryIdentityService {
    /// Creates a new in-memory identity service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a buyer as known and active.
    pub fn register(&self, buyer_id: BuyerId) {
        self.state.write().unwrap().registered.insert(buyer_id);
    }

    /// Marks a buyer as suspended.
    pub fn suspend(&self, buyer_id: BuyerId) {
        self.state.write().unwrap().suspended.insert(buyer_id);
    }

    /// Simulates an outage: every call errors until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.write().unwrap().unreachable = unreachable;
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn is_buyer_valid(&self, buyer_id: BuyerId) -> Result<bool, CheckoutError> {
        let state = self.state.read().unwrap();

        if state.unreachable {
            return Err(CheckoutError::IdentityService(
                "identity service unreachable".to_string(),
            ));
        }

        Ok(state.registered.contains(&buyer_id) && !state.suspended.contains(&buyer_id))
    }
}
