use common::{CartId, TransactionId};
use thiserror::Error;

use crate::record::TransactionStatus;

/// Errors that can occur when interacting with the transaction ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The transaction record was not found.
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    /// The record has already reached a terminal status and cannot be
    /// mutated further.
    #[error("Transaction {transaction_id} already finalized as {status}")]
    AlreadyFinalized {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },

    /// A checkout for this cart is already in flight.
    #[error("A checkout is already in progress for cart {0}")]
    DuplicateCheckout(CartId),

    /// The requested status is not a valid target for the operation.
    #[error("Invalid target status: {0}")]
    InvalidStatus(TransactionStatus),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
