//! Order placement service.

use chrono::{DateTime, Utc};
use common::{CorrelationId, OrderId, SagaId, UserId};
use domain::{Money, Order, OrderLine, OrderSaga, OrderStatus, ProductId};
use messaging::{OrderCreatedEvent, OrderLinePayload};
use serde::{Deserialize, Serialize};
use store::{Store, UnitOfWork};

use crate::error::Result;
use crate::id_generator::OrderIdGenerator;
use crate::idempotency::IdempotencyGuard;

/// A line of an order placement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Request to place a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub shipping_address: String,
    pub lines: Vec<PlaceOrderLine>,
}

/// Response returned for a placed (or replayed) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub saga_id: SagaId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl PlacedOrder {
    fn from_order(order: &Order, saga_id: SagaId) -> Self {
        Self {
            order_id: order.order_id().clone(),
            saga_id,
            user_id: order.user_id().clone(),
            status: order.status(),
            total_amount: order.total_amount(),
            created_at: order.created_at(),
        }
    }
}

/// Write path for new orders plus order queries.
pub struct OrderService<S> {
    store: S,
    id_generator: OrderIdGenerator<S>,
    idempotency: IdempotencyGuard<S>,
}

impl<S: Store + Clone> OrderService<S> {
    pub fn new(store: S, idempotency_ttl: chrono::Duration) -> Self {
        Self {
            id_generator: OrderIdGenerator::new(store.clone()),
            idempotency: IdempotencyGuard::new(store.clone(), idempotency_ttl),
            store,
        }
    }

    /// Places a new order.
    ///
    /// The order, its saga record and the `OrderCreated` outbox entry
    /// are committed in one unit of work. When `idempotency_key` names
    /// an existing live record, the cached response is returned and no
    /// new state is written.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, correlation_id = %correlation_id))]
    pub async fn place_order(
        &self,
        request: PlaceOrder,
        idempotency_key: Option<&str>,
        correlation_id: CorrelationId,
    ) -> Result<PlacedOrder> {
        if let Some(key) = idempotency_key
            && let Some(cached) = self.idempotency.check(key).await?
        {
            return Ok(cached);
        }

        let order_id = self.id_generator.generate().await?;
        let saga_id = SagaId::new();

        let lines: Vec<OrderLine> = request
            .lines
            .into_iter()
            .map(|line| {
                OrderLine::new(
                    line.product_id,
                    line.product_name,
                    line.quantity,
                    line.unit_price,
                )
            })
            .collect();

        let order = Order::new(
            order_id.clone(),
            request.user_id,
            request.shipping_address,
            lines,
        )?;
        let saga = OrderSaga::start(saga_id, &order)?;

        let created = OrderCreatedEvent {
            order_id: order_id.clone(),
            user_id: order.user_id().clone(),
            saga_id,
            total_amount: order.total_amount(),
            shipping_address: order.shipping_address().to_string(),
            order_lines: order
                .lines()
                .iter()
                .map(|line| OrderLinePayload {
                    product_id: line.product_id.as_str().to_string(),
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            correlation_id,
            timestamp: Utc::now(),
        };

        self.store
            .commit(
                UnitOfWork::new()
                    .insert_order(order.clone())
                    .insert_saga(saga)
                    .enqueue(outbox::record(order_id.as_str(), &created)?),
            )
            .await?;

        let response = PlacedOrder::from_order(&order, saga_id);
        if let Some(key) = idempotency_key {
            self.idempotency.store(key, &response).await?;
        }

        metrics::counter!("orders_placed").increment(1);
        tracing::info!(order_id = %order_id, saga_id = %saga_id, "order placed");
        Ok(response)
    }

    /// Looks up a single order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.store.get_order(order_id).await?)
    }

    /// Returns a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.store.get_orders_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderServiceError;
    use domain::SagaState;
    use store::InMemoryStore;

    fn service(store: InMemoryStore) -> OrderService<InMemoryStore> {
        OrderService::new(store, chrono::Duration::hours(24))
    }

    fn request() -> PlaceOrder {
        PlaceOrder {
            user_id: UserId::new("user-1"),
            shipping_address: "1 Main St".to_string(),
            lines: vec![
                PlaceOrderLine {
                    product_id: ProductId::new("prod-1"),
                    product_name: "Widget".to_string(),
                    quantity: 2,
                    unit_price: Money::from_cents(2_500),
                },
                PlaceOrderLine {
                    product_id: ProductId::new("prod-2"),
                    product_name: "Gadget".to_string(),
                    quantity: 1,
                    unit_price: Money::from_cents(5_000),
                },
            ],
        }
    }

    #[tokio::test]
    async fn place_order_commits_order_saga_and_outbox_together() {
        let store = InMemoryStore::new();
        let placed = service(store.clone())
            .place_order(request(), None, CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(placed.status, OrderStatus::Pending);
        assert_eq!(placed.total_amount, Money::from_cents(10_000));

        let order = store.get_order(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.version(), 0);

        let saga = store.get_saga(&placed.saga_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Started);
        assert_eq!(saga.order_id(), &placed.order_id);

        let entries = store.unpublished_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "OrderCreated");
        assert_eq!(entries[0].aggregate_id, placed.order_id.as_str());
        assert_eq!(entries[0].payload["total_amount"], 10_000);
        assert_eq!(entries[0].payload["order_lines"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_idempotency_key_replays_without_new_writes() {
        let store = InMemoryStore::new();
        let service = service(store.clone());

        let first = service
            .place_order(request(), Some("key-1"), CorrelationId::new())
            .await
            .unwrap();
        let second = service
            .place_order(request(), Some("key-1"), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.unpublished_entries().await.unwrap().len(), 1);
        let orders = store
            .get_orders_for_user(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn different_keys_place_distinct_orders() {
        let store = InMemoryStore::new();
        let service = service(store.clone());

        let first = service
            .place_order(request(), Some("key-1"), CorrelationId::new())
            .await
            .unwrap();
        let second = service
            .place_order(request(), Some("key-2"), CorrelationId::new())
            .await
            .unwrap();

        assert_ne!(first.order_id, second.order_id);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let store = InMemoryStore::new();
        let mut bad = request();
        bad.lines.clear();

        let result = service(store.clone())
            .place_order(bad, None, CorrelationId::new())
            .await;

        assert!(matches!(
            result,
            Err(OrderServiceError::Order(domain::OrderError::NoLines))
        ));
        assert!(store.unpublished_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_line_is_rejected() {
        let store = InMemoryStore::new();
        let mut bad = request();
        bad.lines[0].quantity = 0;

        let result = service(store)
            .place_order(bad, None, CorrelationId::new())
            .await;
        assert!(matches!(
            result,
            Err(OrderServiceError::Order(
                domain::OrderError::InvalidQuantity { .. }
            ))
        ));
    }
}
