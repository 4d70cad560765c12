use async_trait::async_trait;
use chrono::Utc;
use common::{BuyerId, CartId, TransactionId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::record::{CompensationEntry, TransactionRecord, TransactionStatus};
use crate::store::LedgerStore;
use crate::{LedgerError, Result};

/// PostgreSQL-backed transaction ledger.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<TransactionRecord> {
        let status_raw: String = row.try_get("status")?;
        let status = TransactionStatus::parse(&status_raw).ok_or_else(|| {
            LedgerError::Serialization(serde_json::Error::io(std::io::Error::other(format!(
                "unknown transaction status '{status_raw}'"
            ))))
        })?;

        let log_json: serde_json::Value = row.try_get("compensation_log")?;
        let compensation_log: Vec<CompensationEntry> = serde_json::from_value(log_json)?;

        Ok(TransactionRecord {
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            cart_reference: CartId::from_uuid(row.try_get::<Uuid, _>("cart_reference")?),
            status,
            current_step: row.try_get("current_step")?,
            completed_steps: row.try_get("completed_steps")?,
            compensation_log,
            error_detail: row.try_get("error_detail")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    /// Explains why a guarded write matched no rows: the record either does
    /// not exist or has already reached a terminal status.
    async fn stale_write_error(&self, transaction_id: TransactionId) -> LedgerError {
        let status: std::result::Result<Option<String>, sqlx::Error> = sqlx::query_scalar(
            "SELECT status FROM checkout_transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id.as_uuid())
        .fetch_optional(&self.pool)
        .await;

        match status {
            Ok(Some(raw)) => match TransactionStatus::parse(&raw) {
                Some(status) if status.is_terminal() => LedgerError::AlreadyFinalized {
                    transaction_id,
                    status,
                },
                _ => LedgerError::NotFound(transaction_id),
            },
            Ok(None) => LedgerError::NotFound(transaction_id),
            Err(e) => LedgerError::Database(e),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn create(
        &self,
        buyer_id: BuyerId,
        cart_reference: CartId,
    ) -> Result<TransactionRecord> {
        let record = TransactionRecord::open(buyer_id, cart_reference);

        sqlx::query(
            r#"
            INSERT INTO checkout_transactions
                (transaction_id, buyer_id, cart_reference, status, completed_steps,
                 compensation_log, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.transaction_id.as_uuid())
        .bind(record.buyer_id.as_uuid())
        .bind(record.cart_reference.as_uuid())
        .bind(record.status.as_str())
        .bind(&record.completed_steps)
        .bind(serde_json::json!([]))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("uniq_checkout_in_flight_cart")
            {
                return LedgerError::DuplicateCheckout(cart_reference);
            }
            LedgerError::Database(e)
        })?;

        tracing::debug!(transaction_id = %record.transaction_id, "ledger record opened");
        Ok(record)
    }

    async fn begin_step(&self, transaction_id: TransactionId, step: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE checkout_transactions
            SET current_step = $2, updated_at = $3
            WHERE transaction_id = $1 AND status = 'processing'
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(step)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_write_error(transaction_id).await);
        }
        Ok(())
    }

    async fn record_step(&self, transaction_id: TransactionId, step: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE checkout_transactions
            SET completed_steps = array_append(completed_steps, $2), updated_at = $3
            WHERE transaction_id = $1 AND status = 'processing'
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(step)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_write_error(transaction_id).await);
        }
        Ok(())
    }

    async fn record_compensation(
        &self,
        transaction_id: TransactionId,
        step: &str,
        outcome: &str,
    ) -> Result<()> {
        // Bound as a one-element array so `||` always means array concat.
        let entry = serde_json::to_value(vec![CompensationEntry::new(step, outcome)])?;

        let result = sqlx::query(
            r#"
            UPDATE checkout_transactions
            SET compensation_log = compensation_log || $2, updated_at = $3
            WHERE transaction_id = $1 AND status = 'processing'
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(entry)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_write_error(transaction_id).await);
        }
        Ok(())
    }

    async fn record_error(&self, transaction_id: TransactionId, detail: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE checkout_transactions
            SET error_detail = COALESCE(error_detail, $2), updated_at = $3
            WHERE transaction_id = $1 AND status = 'processing'
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(detail)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_write_error(transaction_id).await);
        }
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

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE checkout_transactions
            SET status = $2, error_detail = COALESCE(error_detail, $3),
                completed_at = $4, updated_at = $4
            WHERE transaction_id = $1 AND status = 'processing'
            "#,
        )
        .bind(transaction_id.as_uuid())
        .bind(status.as_str())
        .bind(error_detail)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_write_error(transaction_id).await);
        }

        tracing::debug!(%transaction_id, %status, "ledger record finalized");
        Ok(())
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query("SELECT * FROM checkout_transactions WHERE transaction_id = $1")
            .bind(transaction_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn list_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM checkout_transactions WHERE buyer_id = $1 ORDER BY created_at",
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
