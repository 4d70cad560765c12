//! PostgreSQL ledger integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and are
//! serialized because they share one database. Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration
//! ```

use std::sync::Arc;

use common::{BuyerId, CartId, TransactionId};
use ledger::{LedgerError, LedgerStore, PostgresLedger, TransactionStatus};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_checkout_transactions.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn make_ledger() -> PostgresLedger {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    PostgresLedger::new(pool)
}

#[tokio::test]
#[serial]
async fn test_create_and_get_roundtrip() {
    let ledger = make_ledger().await;
    let buyer = BuyerId::new();
    let cart = CartId::new();

    let record = ledger.create(buyer, cart).await.unwrap();

    let fetched = ledger.get(record.transaction_id).await.unwrap().unwrap();
    assert_eq!(fetched.transaction_id, record.transaction_id);
    assert_eq!(fetched.buyer_id, buyer);
    assert_eq!(fetched.cart_reference, cart);
    assert_eq!(fetched.status, TransactionStatus::Processing);
    assert!(fetched.completed_steps.is_empty());
    assert!(fetched.compensation_log.is_empty());
}

#[tokio::test]
#[serial]
async fn test_get_unknown_returns_none() {
    let ledger = make_ledger().await;
    let result = ledger.get(TransactionId::new()).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
#[serial]
async fn test_duplicate_in_flight_cart_rejected() {
    let ledger = make_ledger().await;
    let cart = CartId::new();

    ledger.create(BuyerId::new(), cart).await.unwrap();
    let result = ledger.create(BuyerId::new(), cart).await;
    assert!(matches!(result, Err(LedgerError::DuplicateCheckout(c)) if c == cart));
}

#[tokio::test]
#[serial]
async fn test_finalized_cart_can_be_resubmitted() {
    let ledger = make_ledger().await;
    let buyer = BuyerId::new();
    let cart = CartId::new();

    let first = ledger.create(buyer, cart).await.unwrap();
    ledger
        .finalize(
            first.transaction_id,
            TransactionStatus::Failed,
            Some("payment declined"),
        )
        .await
        .unwrap();

    let second = ledger.create(buyer, cart).await.unwrap();
    assert_ne!(second.transaction_id, first.transaction_id);
}

#[tokio::test]
#[serial]
async fn test_step_and_compensation_logs_append_in_order() {
    let ledger = make_ledger().await;
    let record = ledger.create(BuyerId::new(), CartId::new()).await.unwrap();
    let id = record.transaction_id;

    ledger.begin_step(id, "validate_buyer").await.unwrap();
    ledger.record_step(id, "validate_buyer").await.unwrap();
    ledger.begin_step(id, "reserve_items").await.unwrap();
    ledger.record_step(id, "reserve_items").await.unwrap();
    ledger.begin_step(id, "charge_payment").await.unwrap();

    ledger.record_error(id, "charge declined").await.unwrap();
    ledger
        .record_compensation(id, "reserve_items", "released 2 items")
        .await
        .unwrap();

    let fetched = ledger.get(id).await.unwrap().unwrap();
    assert_eq!(fetched.completed_steps, &["validate_buyer", "reserve_items"]);
    assert_eq!(fetched.current_step.as_deref(), Some("charge_payment"));
    assert_eq!(fetched.error_detail.as_deref(), Some("charge declined"));
    assert_eq!(fetched.compensation_log.len(), 1);
    assert_eq!(fetched.compensation_log[0].step, "reserve_items");
    assert_eq!(fetched.compensation_log[0].outcome, "released 2 items");
}

#[tokio::test]
#[serial]
async fn test_error_detail_is_set_once() {
    let ledger = make_ledger().await;
    let record = ledger.create(BuyerId::new(), CartId::new()).await.unwrap();
    let id = record.transaction_id;

    ledger.record_error(id, "first").await.unwrap();
    ledger.record_error(id, "second").await.unwrap();

    let fetched = ledger.get(id).await.unwrap().unwrap();
    assert_eq!(fetched.error_detail.as_deref(), Some("first"));
}

#[tokio::test]
#[serial]
async fn test_finalize_is_terminal() {
    let ledger = make_ledger().await;
    let record = ledger.create(BuyerId::new(), CartId::new()).await.unwrap();
    let id = record.transaction_id;

    ledger
        .finalize(id, TransactionStatus::Completed, None)
        .await
        .unwrap();

    let fetched = ledger.get(id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TransactionStatus::Completed);
    assert!(fetched.completed_at.is_some());

    // Second finalize and any further writes are rejected.
    let result = ledger
        .finalize(id, TransactionStatus::Failed, Some("too late"))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::AlreadyFinalized {
            status: TransactionStatus::Completed,
            ..
        })
    ));
    assert!(ledger.record_step(id, "issue_tokens").await.is_err());
}

#[tokio::test]
#[serial]
async fn test_list_for_buyer_ordered_by_creation() {
    let ledger = make_ledger().await;
    let buyer = BuyerId::new();

    let first = ledger.create(buyer, CartId::new()).await.unwrap();
    let second = ledger.create(buyer, CartId::new()).await.unwrap();
    ledger.create(BuyerId::new(), CartId::new()).await.unwrap();

    let listed = ledger.list_for_buyer(buyer).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].transaction_id, first.transaction_id);
    assert_eq!(listed[1].transaction_id, second.transaction_id);
}
