//! Saga workflow record.

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::Order;
use crate::saga::SagaState;

/// Rejected saga state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid saga transition from {from} to {to}")]
pub struct SagaTransitionError {
    pub from: SagaState,
    pub to: SagaState,
}

/// Persistent record of an order workflow saga.
///
/// The payload holds a JSON snapshot of the order at saga creation so
/// compensation can inspect the original request without reloading the
/// order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSaga {
    saga_id: SagaId,
    order_id: OrderId,
    state: SagaState,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl OrderSaga {
    /// Starts a new saga for `order`, snapshotting it into the payload.
    pub fn start(saga_id: SagaId, order: &Order) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            saga_id,
            order_id: order.order_id().clone(),
            state: SagaState::Started,
            payload: serde_json::to_value(order)?,
            created_at: now,
            last_updated: now,
        })
    }

    /// Rehydrates a saga from stored fields.
    pub fn from_parts(
        saga_id: SagaId,
        order_id: OrderId,
        state: SagaState,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            saga_id,
            order_id,
            state,
            payload,
            created_at,
            last_updated,
        }
    }

    /// Moves the saga to `next`, rejecting transitions the state
    /// machine does not permit.
    pub fn transition(&mut self, next: SagaState) -> Result<(), SagaTransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(SagaTransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Money, OrderLine, ProductId};
    use common::UserId;

    fn test_order() -> Order {
        Order::new(
            OrderId::from("ORD-0000000001"),
            UserId::new("user-1"),
            "1 Main St".to_string(),
            vec![OrderLine::new(
                ProductId::new("prod-1"),
                "Widget".to_string(),
                2,
                Money::from_cents(5_000),
            )],
        )
        .unwrap()
    }

    #[test]
    fn start_snapshots_the_order() {
        let order = test_order();
        let saga = OrderSaga::start(SagaId::new(), &order).unwrap();

        assert_eq!(saga.order_id(), order.order_id());
        assert_eq!(saga.state(), SagaState::Started);
        assert_eq!(saga.payload()["order_id"], "ORD-0000000001");
        assert_eq!(saga.payload()["total_amount"], 10_000);
    }

    #[test]
    fn transition_follows_state_machine() {
        let order = test_order();
        let mut saga = OrderSaga::start(SagaId::new(), &order).unwrap();

        saga.transition(SagaState::PaymentRequested).unwrap();
        saga.transition(SagaState::PaymentSucceeded).unwrap();
        saga.transition(SagaState::Completed).unwrap();
        assert_eq!(saga.state(), SagaState::Completed);
    }

    #[test]
    fn transition_rejects_invalid_moves() {
        let order = test_order();
        let mut saga = OrderSaga::start(SagaId::new(), &order).unwrap();

        let err = saga.transition(SagaState::Completed).unwrap_err();
        assert_eq!(err.from, SagaState::Started);
        assert_eq!(err.to, SagaState::Completed);
        assert_eq!(saga.state(), SagaState::Started);
    }

    #[test]
    fn transition_from_terminal_state_is_rejected() {
        let order = test_order();
        let mut saga = OrderSaga::start(SagaId::new(), &order).unwrap();
        saga.transition(SagaState::Failed).unwrap();

        assert!(saga.transition(SagaState::PaymentRequested).is_err());
    }

    #[test]
    fn transition_touches_last_updated() {
        let order = test_order();
        let mut saga = OrderSaga::start(SagaId::new(), &order).unwrap();
        let before = saga.last_updated();

        saga.transition(SagaState::PaymentRequested).unwrap();
        assert!(saga.last_updated() >= before);
    }
}
