//! Full wiring test: placement, relay, payment reply, completion.

use std::time::Duration;

use chrono::Utc;
use common::{CorrelationId, PaymentId, UserId};
use domain::{Money, OrderStatus, ProductId, SagaState};
use messaging::{
    InMemoryMessageChannel, Message, MessageHeaders, PaymentSucceededEvent, Topic,
};
use orders::{OrderService, PlaceOrder, PlaceOrderLine};
use saga::SagaOrchestrator;
use service::{Config, Worker};
use store::{InMemoryStore, Store};
use tokio::sync::watch;

#[tokio::test]
async fn order_flows_from_placement_to_confirmation() {
    let mut config = Config::default();
    config.outbox_publish_interval_ms = 10;
    let store = InMemoryStore::new();
    let channel = InMemoryMessageChannel::new();

    let (worker, inbound_tx) = Worker::new(store.clone(), channel.clone(), &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // A client places an order.
    let orders = OrderService::new(store.clone(), config.idempotency_ttl());
    let placed = orders
        .place_order(
            PlaceOrder {
                user_id: UserId::new("user-1"),
                shipping_address: "1 Main St".to_string(),
                lines: vec![PlaceOrderLine {
                    product_id: ProductId::new("prod-1"),
                    product_name: "Widget".to_string(),
                    quantity: 1,
                    unit_price: Money::from_cents(9_900),
                }],
            },
            Some("req-1"),
            CorrelationId::new(),
        )
        .await
        .unwrap();

    // The workflow asks the payment service to charge it.
    SagaOrchestrator::new(store.clone())
        .start_payment_request(&placed.saga_id, CorrelationId::new())
        .await
        .unwrap();

    // The relay pushes both staged entries out to the broker.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let commands = channel.messages(Topic::PaymentCommands).await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].headers.event_type, "PaymentRequested");
    assert_eq!(commands[0].body["amount"], 9_900);

    // The payment service replies with success.
    let reply = PaymentSucceededEvent {
        order_id: placed.order_id.clone(),
        user_id: placed.user_id.clone(),
        saga_id: placed.saga_id,
        payment_id: PaymentId::new("pay-777"),
        correlation_id: CorrelationId::new(),
        timestamp: Utc::now(),
    };
    inbound_tx
        .send(Message::new(
            Topic::OrderEvents,
            placed.order_id.as_str(),
            MessageHeaders {
                event_type: "PaymentSucceeded".to_string(),
                aggregate_type: "Order".to_string(),
                aggregate_id: placed.order_id.as_str().to_string(),
            },
            serde_json::to_value(&reply).unwrap(),
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let order = store.get_order(&placed.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Confirmed);
    let saga = store.get_saga(&placed.saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), SagaState::Completed);

    // The confirmation and notification reach their topics.
    let events = channel.messages(Topic::OrderEvents).await;
    let types: Vec<&str> = events.iter().map(|m| m.headers.event_type.as_str()).collect();
    assert_eq!(types, ["OrderCreated", "OrderConfirmed"]);
    assert_eq!(
        channel.messages(Topic::NotificationCommands).await.len(),
        1
    );

    shutdown_tx.send(true).unwrap();
    let _ = worker_handle.await;
}
