//! Payment gateway client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{BuyerId, TransactionId};

use crate::error::CheckoutError;
use crate::money::Money;

/// Trait for payment processing.
///
/// Both calls are keyed by transaction id, which doubles as the idempotency
/// key: implementations must guarantee at-most-once effect per id, since
/// the orchestrator does not fence against its own retries being replayed
/// by infrastructure.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits one charge for the full cart amount.
    ///
    /// Returns `Ok(false)` when the gateway declines the charge; `Err` when
    /// the gateway itself failed.
    async fn charge(
        &self,
        buyer_id: BuyerId,
        amount: Money,
        transaction_id: TransactionId,
    ) -> Result<bool, CheckoutError>;

    /// Refunds the charge made under this transaction id.
    ///
    /// Returns `Ok(false)` when there was no charge to refund.
    async fn refund(
        &self,
        transaction_id: TransactionId,
        amount: Money,
    ) -> Result<bool, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: HashMap<TransactionId, (BuyerId, Money)>,
    refunds: HashMap<TransactionId, Money>,
    decline_charges: bool,
    fail_on_charge: bool,
}

/// In-memory payment gateway for testing.
///
/// Idempotent by transaction id: a repeated charge under an id that was
/// already charged is acknowledged without recording a second charge.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline charges (a clean `false`).
    pub fn set_decline_charges(&self, decline: bool) {
        self.state.write().unwrap().decline_charges = decline;
    }

    /// Configures the gateway to error on charge calls.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Returns the number of distinct charges on record.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the amount charged under a transaction, if any.
    pub fn charged_amount(&self, transaction_id: TransactionId) -> Option<Money> {
        self.state
            .read()
            .unwrap()
            .charges
            .get(&transaction_id)
            .map(|(_, amount)| *amount)
    }

    /// Returns the number of refunds on record.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        buyer_id: BuyerId,
        amount: Money,
        transaction_id: TransactionId,
    ) -> Result<bool, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_charge {
            return Err(CheckoutError::PaymentGateway(
                "payment gateway unreachable".to_string(),
            ));
        }

        if state.decline_charges {
            return Ok(false);
        }

        // Replay of an already-charged transaction id: acknowledge, record
        // nothing new.
        if state.charges.contains_key(&transaction_id) {
            return Ok(true);
        }

        state.charges.insert(transaction_id, (buyer_id, amount));
        Ok(true)
    }

    async fn refund(
        &self,
        transaction_id: TransactionId,
        amount: Money,
    ) -> Result<bool, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.charges.remove(&transaction_id).is_some() {
            state.refunds.insert(transaction_id, amount);
            return Ok(true);
        }

        // Refund replay is also idempotent.
        Ok(state.refunds.contains_key(&transaction_id))
    }
}
