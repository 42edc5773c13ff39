//! Event and command payloads carried through the outbox and broker.

use chrono::{DateTime, Utc};
use common::{CorrelationId, OrderId, PaymentId, SagaId, UserId};
use domain::Money;
use serde::{Deserialize, Serialize};

/// A payload that knows its event type string. The outbox records this
/// string so the relay can route the entry to the right topic.
pub trait EventPayload: Serialize {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLinePayload {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Published when a new order has been accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub total_amount: Money,
    pub shipping_address: String,
    pub order_lines: Vec<OrderLinePayload>,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload for OrderCreatedEvent {
    fn event_type(&self) -> &'static str {
        "OrderCreated"
    }
}

/// Command asking the payment service to charge an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestCommand {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub amount: Money,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload for PaymentRequestCommand {
    fn event_type(&self) -> &'static str {
        "PaymentRequested"
    }
}

/// Inbound: the payment service charged the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub payment_id: PaymentId,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

/// Inbound: the payment service declined or failed the charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub reason: String,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

/// Published when payment succeeded and the order is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub payment_id: PaymentId,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload for OrderConfirmedEvent {
    fn event_type(&self) -> &'static str {
        "OrderConfirmed"
    }
}

/// Published when an order is cancelled during compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub saga_id: SagaId,
    pub reason: String,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload for OrderCancelledEvent {
    fn event_type(&self) -> &'static str {
        "OrderCancelled"
    }
}

/// Command asking the notification service to notify a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationCommand {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub saga_id: SagaId,
    pub notification_type: String,
    pub message: String,
    pub correlation_id: CorrelationId,
    pub timestamp: DateTime<Utc>,
}

impl EventPayload for NotificationCommand {
    fn event_type(&self) -> &'static str {
        "NotificationRequested"
    }
}

/// Closed set of inbound payment events the saga reacts to.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    Succeeded(PaymentSucceededEvent),
    Failed(PaymentFailedEvent),
}

impl PaymentEvent {
    /// Decodes a payment event from its type string and body.
    ///
    /// Returns `Ok(None)` for event types outside the closed set; the
    /// caller decides whether to log and skip. A body that fails to
    /// deserialize for a known type is an error.
    pub fn decode(
        event_type: &str,
        body: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        match event_type {
            "PaymentSucceeded" => Ok(Some(PaymentEvent::Succeeded(serde_json::from_value(
                body.clone(),
            )?))),
            "PaymentFailed" => Ok(Some(PaymentEvent::Failed(serde_json::from_value(
                body.clone(),
            )?))),
            _ => Ok(None),
        }
    }

    pub fn saga_id(&self) -> SagaId {
        match self {
            PaymentEvent::Succeeded(e) => e.saga_id,
            PaymentEvent::Failed(e) => e.saga_id,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            PaymentEvent::Succeeded(e) => &e.correlation_id,
            PaymentEvent::Failed(e) => &e.correlation_id,
        }
    }
}
