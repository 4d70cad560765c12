use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{BuyerId, CartId, TransactionId};
use tokio::sync::RwLock;

use crate::record::{CompensationEntry, TransactionRecord, TransactionStatus};
use crate::store::LedgerStore;
use crate::{LedgerError, Result};

/// In-memory transaction ledger for testing.
///
/// Provides the same interface and invariants as the PostgreSQL
/// implementation, including rejection of duplicate in-flight checkouts
/// and of writes against terminal records.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    records: Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

/// Looks up a record and rejects the write if it is already terminal.
fn writable<'a>(
    records: &'a mut HashMap<TransactionId, TransactionRecord>,
    transaction_id: TransactionId,
) -> Result<&'a mut TransactionRecord> {
    let record = records
        .get_mut(&transaction_id)
        .ok_or(LedgerError::NotFound(transaction_id))?;
    if record.status.is_terminal() {
        return Err(LedgerError::AlreadyFinalized {
            transaction_id,
            status: record.status,
        });
    }
    Ok(record)
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create(
        &self,
        buyer_id: BuyerId,
        cart_reference: CartId,
    ) -> Result<TransactionRecord> {
        let mut records = self.records.write().await;

        let in_flight = records.values().any(|r| {
            r.cart_reference == cart_reference && r.status == TransactionStatus::Processing
        });
        if in_flight {
            return Err(LedgerError::DuplicateCheckout(cart_reference));
        }

        let record = TransactionRecord::open(buyer_id, cart_reference);
        records.insert(record.transaction_id, record.clone());
        Ok(record)
    }

    async fn begin_step(&self, transaction_id: TransactionId, step: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = writable(&mut records, transaction_id)?;
        record.current_step = Some(step.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_step(&self, transaction_id: TransactionId, step: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = writable(&mut records, transaction_id)?;
        record.completed_steps.push(step.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_compensation(
        &self,
        transaction_id: TransactionId,
        step: &str,
        outcome: &str,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = writable(&mut records, transaction_id)?;
        record
            .compensation_log
            .push(CompensationEntry::new(step, outcome));
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_error(&self, transaction_id: TransactionId, detail: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = writable(&mut records, transaction_id)?;
        if record.error_detail.is_none() {
            record.error_detail = Some(detail.to_string());
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize(
        &self,
        transaction_id: TransactionId,
        status: TransactionStatus,
        error_detail: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(LedgerError::InvalidStatus(status));
        }

        let mut records = self.records.write().await;
        let record = writable(&mut records, transaction_id)?;
        let now = Utc::now();
        record.status = status;
        if record.error_detail.is_none() {
            record.error_detail = error_detail.map(str::to_string);
        }
        record.completed_at = Some(now);
        record.updated_at = now;
        Ok(())
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&transaction_id).cloned())
    }

    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.buyer_id == buyer_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }
}
