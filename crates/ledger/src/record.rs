//! Transaction record model.

use chrono::{DateTime, Utc};
use common::{BuyerId, CartId, TransactionId};
use serde::{Deserialize, Serialize};

/// The status of a checkout transaction.
///
/// Status transitions:
/// ```text
/// Processing ──┬──► Completed
///              └──► Failed
/// ```
///
/// `Completed` and `Failed` are terminal; a terminal record is never
/// mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransactionStatus {
    /// The checkout pipeline is running (or was interrupted mid-run).
    #[default]
    Processing,

    /// All essential steps completed and tokens were issued (terminal).
    Completed,

    /// A step failed and compensation has run (terminal).
    Failed,
}

impl TransactionStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(TransactionStatus::Processing),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a transaction's compensation log.
///
/// Appended once per compensation attempt during rollback, whether or not
/// the compensating action itself succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationEntry {
    /// The step whose compensation was attempted.
    pub step: String,
    /// Human-readable outcome of the attempt (success or error text).
    pub outcome: String,
    /// When the attempt was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl CompensationEntry {
    /// Creates a new entry stamped with the current time.
    pub fn new(step: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            outcome: outcome.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Durable record of one checkout attempt.
///
/// Created when the checkout starts and owned by the orchestrator for its
/// lifetime. `completed_steps` and `compensation_log` are append-only;
/// `error_detail` is set once, on first failure; `completed_at` is set
/// exactly once, at the terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Globally unique, allocated at creation, immutable.
    pub transaction_id: TransactionId,
    /// The buyer who initiated the checkout.
    pub buyer_id: BuyerId,
    /// Reference to the cart being purchased.
    pub cart_reference: CartId,
    /// Current lifecycle status.
    pub status: TransactionStatus,
    /// Name of the step last attempted; informational, overwritten per attempt.
    pub current_step: Option<String>,
    /// Step names that finished their forward action, in completion order.
    pub completed_steps: Vec<String>,
    /// Compensation attempts, in the order they ran (reverse step order).
    pub compensation_log: Vec<CompensationEntry>,
    /// Failure cause, if the transaction failed.
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the record reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Creates a fresh PROCESSING record for a new checkout attempt.
    pub fn open(buyer_id: BuyerId, cart_reference: CartId) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: TransactionId::new(),
            buyer_id,
            cart_reference,
            status: TransactionStatus::Processing,
            current_step: None,
            completed_steps: Vec::new(),
            compensation_log: Vec::new(),
            error_detail: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Returns true if the record has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
