//! The step abstraction the orchestration engine runs over.

use async_trait::async_trait;
use common::{BuyerId, TransactionId};

use crate::cart::CartSnapshot;
use crate::error::CheckoutError;
use crate::token::PurchaseToken;

/// Mutable state threaded through one checkout's pipeline.
///
/// Forward actions may write to it (the token step deposits its tokens
/// here); compensations only read it.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub transaction_id: TransactionId,
    pub buyer_id: BuyerId,
    pub cart: CartSnapshot,
    /// Filled by the token issuance step on success.
    pub tokens: Vec<PurchaseToken>,
}

impl StepContext {
    /// Creates the context for a fresh checkout attempt.
    pub fn new(transaction_id: TransactionId, buyer_id: BuyerId, cart: CartSnapshot) -> Self {
        Self {
            transaction_id,
            buyer_id,
            cart,
            tokens: Vec::new(),
        }
    }
}

/// One step of the checkout pipeline, expressed as a value.
///
/// The engine is generic over a list of these: it iterates forward calling
/// `forward`, and on a fatal failure walks the completed prefix backwards
/// calling `compensate` on every step that has one. Keeping the pipeline
/// as data keeps the engine free of per-step branching and lets tests run
/// it against fake steps.
#[async_trait]
pub trait CheckoutStep: Send + Sync {
    /// Stable step name, recorded in the ledger.
    fn name(&self) -> &'static str;

    /// The step's forward action.
    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError>;

    /// Whether this step has a compensating action. Steps that mutate no
    /// authoritative external state (read-only checks, side channels) don't.
    fn has_compensation(&self) -> bool {
        false
    }

    /// Semantically undoes the forward action. Returns a short description
    /// of what was undone, for the compensation log.
    ///
    /// Only called when `has_compensation()` is true.
    async fn compensate(&self, _ctx: &StepContext) -> Result<String, CheckoutError> {
        Ok(String::new())
    }

    /// Whether a failure of this step aborts the checkout. Non-fatal steps
    /// have their failures logged and swallowed.
    fn fatal_on_failure(&self) -> bool {
        true
    }
}
