use async_trait::async_trait;
use common::{BuyerId, CartId, TransactionId};

use crate::record::{TransactionRecord, TransactionStatus};
use crate::Result;

/// Core trait for transaction ledger implementations.
///
/// The ledger keeps one durable record per checkout attempt. Writes are
/// keyed by `transaction_id`; distinct transactions never contend, so
/// implementations need no cross-transaction locking.
///
/// The orchestrator relies on a strict "record then proceed" ordering:
/// `record_step` must have returned before the next step's forward action
/// starts, so a crash between the two looks, on recovery, like the step
/// never completed.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a new PROCESSING record and allocates its transaction id.
    ///
    /// Fails with [`LedgerError::DuplicateCheckout`] if another PROCESSING
    /// record exists for the same cart reference — two in-flight checkouts
    /// for one cart could double-charge. Terminal records do not block a
    /// resubmission.
    ///
    /// [`LedgerError::DuplicateCheckout`]: crate::LedgerError::DuplicateCheckout
    async fn create(&self, buyer_id: BuyerId, cart_reference: CartId)
    -> Result<TransactionRecord>;

    /// Overwrites `current_step` with the step now being attempted.
    async fn begin_step(&self, transaction_id: TransactionId, step: &str) -> Result<()>;

    /// Appends a successfully finished step to `completed_steps`.
    async fn record_step(&self, transaction_id: TransactionId, step: &str) -> Result<()>;

    /// Appends a compensation attempt and its outcome to `compensation_log`.
    async fn record_compensation(
        &self,
        transaction_id: TransactionId,
        step: &str,
        outcome: &str,
    ) -> Result<()>;

    /// Sets `error_detail` if it is not already set.
    ///
    /// Called at the moment of first failure, before compensation starts,
    /// so the cause survives a crash mid-rollback. A second call is a no-op.
    async fn record_error(&self, transaction_id: TransactionId, detail: &str) -> Result<()>;

    /// Moves the record to a terminal status and stamps `completed_at`.
    ///
    /// Fails with [`LedgerError::AlreadyFinalized`] if the record is already
    /// terminal, and with [`LedgerError::InvalidStatus`] if `status` is not
    /// terminal.
    ///
    /// [`LedgerError::AlreadyFinalized`]: crate::LedgerError::AlreadyFinalized
    /// [`LedgerError::InvalidStatus`]: crate::LedgerError::InvalidStatus
    async fn finalize(
        &self,
        transaction_id: TransactionId,
        status: TransactionStatus,
        error_detail: Option<&str>,
    ) -> Result<()>;

    /// Retrieves a record by transaction id.
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Lists all records for a buyer, oldest first.
    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<TransactionRecord>>;
}
