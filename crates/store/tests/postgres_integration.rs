//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{OrderId, SagaId, UserId};
use domain::{
    AGGREGATE_TYPE_ORDER, IdempotencyRecord, Money, NewOutboxEntry, Order, OrderLine, OrderSaga,
    ProductId, SagaState,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{PostgresStore, Store, StoreError, UnitOfWork};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

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

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/0001_create_order_service_tables.sql"
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE order_lines, orders, order_sagas, outbox_entries, idempotency_records",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn test_order(order_id: &str, user_id: &str) -> Order {
    Order::new(
        OrderId::from(order_id),
        UserId::new(user_id),
        "1 Main St".to_string(),
        vec![
            OrderLine::new(
                ProductId::new("prod-1"),
                "Widget".to_string(),
                2,
                Money::from_cents(2_500),
            ),
            OrderLine::new(
                ProductId::new("prod-2"),
                "Gadget".to_string(),
                1,
                Money::from_cents(5_000),
            ),
        ],
    )
    .unwrap()
}

#[tokio::test]
#[serial]
async fn commit_and_reload_order_with_lines() {
    let store = get_test_store().await;
    let order = test_order("ORD-0000000001", "user-1");

    store
        .commit(UnitOfWork::new().insert_order(order.clone()))
        .await
        .unwrap();

    let stored = store.get_order(order.order_id()).await.unwrap().unwrap();
    assert_eq!(stored.user_id().as_str(), "user-1");
    assert_eq!(stored.total_amount(), Money::from_cents(10_000));
    assert_eq!(stored.lines().len(), 2);
    assert_eq!(stored.lines()[0].product_id.as_str(), "prod-1");
    assert_eq!(stored.version(), 0);
}

#[tokio::test]
#[serial]
async fn duplicate_order_insert_rolls_back_everything() {
    let store = get_test_store().await;
    let order = test_order("ORD-0000000001", "user-1");
    store
        .commit(UnitOfWork::new().insert_order(order.clone()))
        .await
        .unwrap();

    let result = store
        .commit(
            UnitOfWork::new()
                .enqueue(NewOutboxEntry::new(
                    AGGREGATE_TYPE_ORDER,
                    "ORD-0000000001",
                    "OrderConfirmed",
                    serde_json::json!({}),
                ))
                .insert_order(order),
        )
        .await;

    assert!(matches!(result, Err(StoreError::DuplicateOrder(_))));
    assert!(store.unpublished_entries().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn version_conflict_is_detected() {
    let store = get_test_store().await;
    let order = test_order("ORD-0000000001", "user-1");
    store
        .commit(UnitOfWork::new().insert_order(order.clone()))
        .await
        .unwrap();

    let mut first = store.get_order(order.order_id()).await.unwrap().unwrap();
    let mut second = first.clone();
    let read_version = first.version();

    first.request_payment().unwrap();
    store
        .commit(UnitOfWork::new().update_order(first, read_version))
        .await
        .unwrap();

    let stored = store.get_order(order.order_id()).await.unwrap().unwrap();
    assert_eq!(stored.version(), read_version + 1);

    second.request_payment().unwrap();
    let result = store
        .commit(UnitOfWork::new().update_order(second, read_version))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::VersionConflict { expected: 0, actual: 1, .. })
    ));
}

#[tokio::test]
#[serial]
async fn orders_for_user_come_back_newest_first() {
    let store = get_test_store().await;
    for i in 1..=3 {
        store
            .commit(
                UnitOfWork::new()
                    .insert_order(test_order(&format!("ORD-000000000{i}"), "user-1")),
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    store
        .commit(UnitOfWork::new().insert_order(test_order("ORD-0000000009", "user-2")))
        .await
        .unwrap();

    let orders = store
        .get_orders_for_user(&UserId::new("user-1"))
        .await
        .unwrap();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].order_id().as_str(), "ORD-0000000003");
    assert_eq!(orders[2].order_id().as_str(), "ORD-0000000001");
}

#[tokio::test]
#[serial]
async fn saga_roundtrip_and_stalled_detection() {
    let store = get_test_store().await;
    let order = test_order("ORD-0000000001", "user-1");
    let saga = OrderSaga::start(SagaId::new(), &order).unwrap();
    store
        .commit(
            UnitOfWork::new()
                .insert_order(order)
                .insert_saga(saga.clone()),
        )
        .await
        .unwrap();

    let mut stored = store.get_saga(saga.saga_id()).await.unwrap().unwrap();
    assert_eq!(stored.state(), SagaState::Started);
    assert_eq!(stored.payload()["order_id"], "ORD-0000000001");

    let stale = stored.clone();
    stored.transition(SagaState::PaymentRequested).unwrap();
    store
        .commit(UnitOfWork::new().update_saga(stored, SagaState::Started))
        .await
        .unwrap();

    let reloaded = store.get_saga(saga.saga_id()).await.unwrap().unwrap();
    assert_eq!(reloaded.state(), SagaState::PaymentRequested);

    // A writer holding the pre-transition snapshot must be rejected.
    let mut racer = stale;
    racer.transition(SagaState::PaymentRequested).unwrap();
    let result = store
        .commit(UnitOfWork::new().update_saga(racer, SagaState::Started))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::SagaStateConflict {
            actual: SagaState::PaymentRequested,
            ..
        })
    ));

    let stalled = store
        .find_stalled_sagas(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(stalled.len(), 1);

    let none = store
        .find_stalled_sagas(Utc::now() - Duration::minutes(30))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
#[serial]
async fn outbox_entries_publish_and_clean_up() {
    let store = get_test_store().await;
    let mut work = UnitOfWork::new();
    for event_type in ["OrderCreated", "PaymentRequested"] {
        work = work.enqueue(NewOutboxEntry::new(
            AGGREGATE_TYPE_ORDER,
            "ORD-0000000001",
            event_type,
            serde_json::json!({"event": event_type}),
        ));
    }
    store.commit(work).await.unwrap();

    let entries = store.unpublished_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event_type, "OrderCreated");
    assert_eq!(entries[1].event_type, "PaymentRequested");

    store
        .mark_published(entries[0].id, Utc::now() - Duration::days(8))
        .await
        .unwrap();
    assert_eq!(store.unpublished_entries().await.unwrap().len(), 1);

    let removed = store
        .delete_published_before(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
#[serial]
async fn idempotency_records_roundtrip_and_reject_duplicates() {
    let store = get_test_store().await;
    let record = IdempotencyRecord::new(
        "key-1",
        serde_json::json!({"order_id": "ORD-0000000001"}),
        Duration::hours(24),
    );
    store.put_idempotency_record(record).await.unwrap();

    let stored = store.get_idempotency_record("key-1").await.unwrap().unwrap();
    assert_eq!(stored.response_payload["order_id"], "ORD-0000000001");
    assert!(!stored.is_expired(Utc::now()));

    let duplicate = IdempotencyRecord::new("key-1", serde_json::json!({}), Duration::hours(24));
    let result = store.put_idempotency_record(duplicate).await;
    assert!(matches!(result, Err(StoreError::DuplicateIdempotencyKey(_))));

    assert!(store.get_idempotency_record("missing").await.unwrap().is_none());
}
