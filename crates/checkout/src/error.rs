//! Checkout error types.

use std::time::Duration;

use ledger::LedgerError;
use thiserror::Error;

use crate::cart::CartError;

/// Errors that can occur during checkout execution.
///
/// Every forward-pass failure funnels into the same compensation path;
/// the distinction here is what the caller can do about it. `Validation`
/// and `Cart` are the caller's fault and recoverable by fixing the input;
/// the rest are internal or downstream faults.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The buyer or an item failed a pre-purchase check.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The payment gateway declined or errored on the charge.
    #[error("payment failed: {0}")]
    Payment(String),

    /// Purchase token creation failed.
    #[error("token issuance failed: {0}")]
    Issuance(String),

    /// A non-essential side channel (statistics) failed. Never fatal.
    #[error("side effect failed: {0}")]
    SideEffect(String),

    /// Identity service transport error.
    #[error("identity service error: {0}")]
    IdentityService(String),

    /// Catalog service transport error.
    #[error("catalog service error: {0}")]
    CatalogService(String),

    /// Payment gateway transport error.
    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    /// A step's remote call exceeded its timeout.
    #[error("step '{step}' timed out after {timeout:?}")]
    StepTimeout { step: String, timeout: Duration },

    /// The cart snapshot violated its invariants.
    #[error("invalid cart: {0}")]
    Cart(#[from] CartError),

    /// Transaction ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl CheckoutError {
    /// Returns true if the failure is the caller's to fix (the
    /// 4xx-equivalent class: bad cart, invalid buyer, unavailable item).
    pub fn is_client_error(&self) -> bool {
        matches!(self, CheckoutError::Validation(_) | CheckoutError::Cart(_))
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
