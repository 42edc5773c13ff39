use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId, UserId};
use domain::{IdempotencyRecord, NewOutboxEntry, Order, OrderSaga, OutboxEntry, SagaState};

use crate::error::Result;

/// Writes staged for a single atomic commit.
///
/// Order updates carry the version the caller read; the store applies
/// the update only if the persisted version still matches, and bumps it
/// by one on success. A mismatch fails the whole unit of work with
/// [`StoreError::VersionConflict`](crate::StoreError::VersionConflict).
/// Saga updates are guarded the same way by the state the caller
/// observed, so a concurrent transition cannot be overwritten.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pub(crate) order_inserts: Vec<Order>,
    pub(crate) order_updates: Vec<(Order, i64)>,
    pub(crate) saga_inserts: Vec<OrderSaga>,
    pub(crate) saga_updates: Vec<(OrderSaga, SagaState)>,
    pub(crate) outbox_entries: Vec<NewOutboxEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(mut self, order: Order) -> Self {
        self.order_inserts.push(order);
        self
    }

    /// Stages an order update guarded by the version the caller read.
    pub fn update_order(mut self, order: Order, expected_version: i64) -> Self {
        self.order_updates.push((order, expected_version));
        self
    }

    pub fn insert_saga(mut self, saga: OrderSaga) -> Self {
        self.saga_inserts.push(saga);
        self
    }

    /// Stages a saga update guarded by the state the caller observed.
    /// The update applies only if the persisted saga is still in
    /// `observed_state`; otherwise the commit fails with
    /// [`StoreError::SagaStateConflict`](crate::StoreError::SagaStateConflict).
    pub fn update_saga(mut self, saga: OrderSaga, observed_state: SagaState) -> Self {
        self.saga_updates.push((saga, observed_state));
        self
    }

    pub fn enqueue(mut self, entry: NewOutboxEntry) -> Self {
        self.outbox_entries.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_inserts.is_empty()
            && self.order_updates.is_empty()
            && self.saga_inserts.is_empty()
            && self.saga_updates.is_empty()
            && self.outbox_entries.is_empty()
    }
}

/// Persistence operations shared by the in-memory and Postgres backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Applies every staged write atomically. Either all writes land or
    /// none do.
    async fn commit(&self, work: UnitOfWork) -> Result<()>;

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Returns all orders for a user, newest first.
    async fn get_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>>;

    async fn order_exists(&self, order_id: &OrderId) -> Result<bool>;

    async fn get_saga(&self, saga_id: &SagaId) -> Result<Option<OrderSaga>>;

    /// Returns non-terminal sagas whose last update is older than `cutoff`.
    async fn find_stalled_sagas(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderSaga>>;

    /// Returns unpublished outbox entries in insertion order (oldest
    /// first, id ascending).
    async fn unpublished_entries(&self) -> Result<Vec<OutboxEntry>>;

    async fn mark_published(&self, entry_id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Deletes published entries whose publication time is older than
    /// `cutoff`. Returns the number of rows removed.
    async fn delete_published_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn get_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Inserts an idempotency record; a key that already exists fails
    /// with [`StoreError::DuplicateIdempotencyKey`](crate::StoreError::DuplicateIdempotencyKey).
    async fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<()>;
}
