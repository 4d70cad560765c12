//! Checkout outcome returned to the caller.

use common::TransactionId;
use serde::{Deserialize, Serialize};

use crate::token::PurchaseToken;

/// The result of one checkout attempt.
///
/// `execute` never fails across its boundary; whatever happened inside the
/// pipeline is reported here. `transaction_id` is `None` only when the
/// attempt was rejected before a ledger record existed (invalid cart,
/// duplicate submission, ledger unavailable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    /// True if the purchase went through and tokens were issued.
    pub success: bool,
    /// The issued purchase tokens; empty unless `success`.
    pub tokens: Vec<PurchaseToken>,
    /// The ledger record for this attempt, if one was created.
    pub transaction_id: Option<TransactionId>,
    /// Failure cause, if any.
    pub error: Option<String>,
}

impl CheckoutOutcome {
    /// A successful checkout with its issued tokens.
    pub fn completed(transaction_id: TransactionId, tokens: Vec<PurchaseToken>) -> Self {
        Self {
            success: true,
            tokens,
            transaction_id: Some(transaction_id),
            error: None,
        }
    }

    /// A checkout that failed after its ledger record was created.
    pub fn failed(transaction_id: TransactionId, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tokens: Vec::new(),
            transaction_id: Some(transaction_id),
            error: Some(error.into()),
        }
    }

    /// A checkout rejected before any ledger record existed.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tokens: Vec::new(),
            transaction_id: None,
            error: Some(error.into()),
        }
    }

    /// Returns true if the purchase completed.
    pub fn is_success(&self) -> bool {
        self.success
    }
}
