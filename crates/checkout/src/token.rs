//! Purchase tokens and the token issuer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, ItemId, TransactionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::LineItem;
use crate::error::CheckoutError;
use crate::money::Money;

/// Lifecycle status of a purchase token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TokenStatus {
    /// The token is valid proof of purchase.
    #[default]
    Active,

    /// The token was revoked during compensation.
    Revoked,
}

/// Proof-of-purchase record, one per line item of a completed checkout.
///
/// Tokens exist only inside a referencing transaction: they are created in
/// the token-issuance step and destroyed only by its compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseToken {
    /// Unique token string, derived deterministically from the transaction.
    pub token: String,
    pub buyer_id: BuyerId,
    pub transaction_id: TransactionId,
    pub item_id: ItemId,
    /// Item display name at purchase time.
    pub item_name: String,
    /// The line price actually paid.
    pub purchase_price: Money,
    pub issued_at: DateTime<Utc>,
    pub status: TokenStatus,
}

/// Derives the token string for one line of a transaction.
///
/// UUIDv5 in the transaction's namespace, so the same (transaction, line)
/// always yields the same token and accidental re-issuance is detectable
/// rather than silently minting fresh proofs.
pub fn derive_token(transaction_id: TransactionId, index: usize, item_id: ItemId) -> String {
    let name = format!("{index}:{item_id}");
    let id = Uuid::new_v5(&transaction_id.as_uuid(), name.as_bytes());
    let hex = id.simple().to_string();
    format!("TPT-{}", hex[..16].to_uppercase())
}

/// Trait for purchase token issuance.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues one token per line item, atomically as a batch.
    ///
    /// Must reject a second issuance for the same transaction id — the
    /// orchestrator never retries a step, so a repeat call means something
    /// upstream went wrong.
    async fn issue(
        &self,
        transaction_id: TransactionId,
        buyer_id: BuyerId,
        items: &[LineItem],
    ) -> Result<Vec<PurchaseToken>, CheckoutError>;

    /// Revokes every token referencing the transaction, returning how many
    /// were removed. Idempotent: revoking an unknown transaction is Ok(0).
    async fn revoke_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<usize, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryTokenState {
    tokens: HashMap<TransactionId, Vec<PurchaseToken>>,
    fail_on_issue: bool,
}

/// In-memory token issuer for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenIssuer {
    state: Arc<RwLock<InMemoryTokenState>>,
}

impl InMemoryTokenIssuer {
    /// Creates a new in-memory token issuer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the issuer to fail on the next issue call.
    pub fn set_fail_on_issue(&self, fail: bool) {
        self.state.write().unwrap().fail_on_issue = fail;
    }

    /// Returns the total number of live tokens across all transactions.
    pub fn token_count(&self) -> usize {
        self.state.read().unwrap().tokens.values().map(Vec::len).sum()
    }

    /// Returns the tokens issued for a transaction, if any.
    pub fn tokens_for(&self, transaction_id: TransactionId) -> Vec<PurchaseToken> {
        self.state
            .read()
            .unwrap()
            .tokens
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenIssuer for InMemoryTokenIssuer {
    async fn issue(
        &self,
        transaction_id: TransactionId,
        buyer_id: BuyerId,
        items: &[LineItem],
    ) -> Result<Vec<PurchaseToken>, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_issue {
            return Err(CheckoutError::Issuance("token store unavailable".to_string()));
        }

        if state.tokens.contains_key(&transaction_id) {
            return Err(CheckoutError::Issuance(format!(
                "tokens already issued for transaction {transaction_id}"
            )));
        }

        let issued_at = Utc::now();
        let tokens: Vec<PurchaseToken> = items
            .iter()
            .enumerate()
            .map(|(index, item)| PurchaseToken {
                token: derive_token(transaction_id, index, item.item_id),
                buyer_id,
                transaction_id,
                item_id: item.item_id,
                item_name: item.name.clone(),
                purchase_price: item.line_price(),
                issued_at,
                status: TokenStatus::Active,
            })
            .collect();

        state.tokens.insert(transaction_id, tokens.clone());
        Ok(tokens)
    }

    async fn revoke_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<usize, CheckoutError> {
        let mut state = self.state.write().unwrap();
        Ok(state
            .tokens
            .remove(&transaction_id)
            .map(|tokens| tokens.len())
            .unwrap_or(0))
    }
}
