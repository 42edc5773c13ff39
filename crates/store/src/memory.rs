use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId, UserId};
use domain::{IdempotencyRecord, Order, OrderSaga, OutboxEntry};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{Store, UnitOfWork};

/// In-memory store for testing and local development.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    sagas: HashMap<SagaId, OrderSaga>,
    outbox: Vec<OutboxEntry>,
    next_entry_id: i64,
    idempotency: HashMap<String, IdempotencyRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every outbox entry, published or not. Test helper.
    pub async fn all_outbox_entries(&self) -> Vec<OutboxEntry> {
        self.inner.read().await.outbox.clone()
    }
}

impl Inner {
    /// Validates every staged write against current state. Nothing is
    /// applied until validation of the whole unit of work succeeds.
    fn validate(&self, work: &UnitOfWork) -> Result<()> {
        for order in &work.order_inserts {
            if self.orders.contains_key(order.order_id()) {
                return Err(StoreError::DuplicateOrder(order.order_id().clone()));
            }
        }
        for (order, expected_version) in &work.order_updates {
            let current = self
                .orders
                .get(order.order_id())
                .ok_or_else(|| StoreError::OrderNotFound(order.order_id().clone()))?;
            if current.version() != *expected_version {
                return Err(StoreError::VersionConflict {
                    order_id: order.order_id().clone(),
                    expected: *expected_version,
                    actual: current.version(),
                });
            }
        }
        for saga in &work.saga_inserts {
            if self.sagas.contains_key(saga.saga_id()) {
                return Err(StoreError::DuplicateSaga(*saga.saga_id()));
            }
        }
        for (saga, observed_state) in &work.saga_updates {
            let current = self
                .sagas
                .get(saga.saga_id())
                .ok_or(StoreError::SagaNotFound(*saga.saga_id()))?;
            if current.state() != *observed_state {
                return Err(StoreError::SagaStateConflict {
                    saga_id: *saga.saga_id(),
                    expected: *observed_state,
                    actual: current.state(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.validate(&work)?;

        for order in work.order_inserts {
            inner.orders.insert(order.order_id().clone(), order);
        }
        for (mut order, expected_version) in work.order_updates {
            order.set_version(expected_version + 1);
            inner.orders.insert(order.order_id().clone(), order);
        }
        for saga in work.saga_inserts {
            inner.sagas.insert(*saga.saga_id(), saga);
        }
        for (saga, _) in work.saga_updates {
            inner.sagas.insert(*saga.saga_id(), saga);
        }
        for staged in work.outbox_entries {
            inner.next_entry_id += 1;
            let id = inner.next_entry_id;
            inner.outbox.push(OutboxEntry::from_new(id, staged));
        }
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(order_id).cloned())
    }

    async fn get_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn order_exists(&self, order_id: &OrderId) -> Result<bool> {
        Ok(self.inner.read().await.orders.contains_key(order_id))
    }

    async fn get_saga(&self, saga_id: &SagaId) -> Result<Option<OrderSaga>> {
        Ok(self.inner.read().await.sagas.get(saga_id).cloned())
    }

    async fn find_stalled_sagas(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderSaga>> {
        let inner = self.inner.read().await;
        let mut stalled: Vec<OrderSaga> = inner
            .sagas
            .values()
            .filter(|saga| !saga.state().is_terminal() && saga.last_updated() < cutoff)
            .cloned()
            .collect();
        stalled.sort_by(|a, b| a.last_updated().cmp(&b.last_updated()));
        Ok(stalled)
    }

    async fn unpublished_entries(&self) -> Result<Vec<OutboxEntry>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<OutboxEntry> = inner
            .outbox
            .iter()
            .filter(|entry| !entry.published)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn mark_published(&self, entry_id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.outbox.iter_mut().find(|entry| entry.id == entry_id) {
            entry.mark_published(at);
        }
        Ok(())
    }

    async fn delete_published_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.outbox.len();
        inner
            .outbox
            .retain(|entry| !(entry.published && entry.published_at.is_some_and(|at| at < cutoff)));
        Ok((before - inner.outbox.len()) as u64)
    }

    async fn get_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        Ok(self.inner.read().await.idempotency.get(key).cloned())
    }

    async fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.idempotency.contains_key(&record.key) {
            return Err(StoreError::DuplicateIdempotencyKey(record.key));
        }
        inner.idempotency.insert(record.key.clone(), record);
        Ok(())
    }
}
