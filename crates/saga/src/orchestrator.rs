//! Orchestrator driving the order payment workflow.

use chrono::Utc;
use common::{CorrelationId, SagaId};
use domain::{Order, OrderSaga, SagaState};
use messaging::{
    NotificationCommand, OrderCancelledEvent, OrderConfirmedEvent, PaymentFailedEvent,
    PaymentRequestCommand, PaymentSucceededEvent,
};
use store::{Store, UnitOfWork};

use crate::error::{Result, SagaError};

/// Coordinates saga, order and outbox updates for the payment workflow.
///
/// Each step commits the saga transition, the order transition and any
/// outbox entries in one unit of work, so observers never see a saga
/// ahead of its order or an event without its state change.
pub struct SagaOrchestrator<S> {
    store: S,
}

impl<S: Store> SagaOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn load_saga(&self, saga_id: &SagaId) -> Result<OrderSaga> {
        self.store
            .get_saga(saga_id)
            .await?
            .ok_or(SagaError::SagaNotFound(*saga_id))
    }

    async fn load_order(&self, saga: &OrderSaga) -> Result<Order> {
        self.store
            .get_order(saga.order_id())
            .await?
            .ok_or_else(|| SagaError::OrderNotFound(saga.order_id().clone()))
    }

    /// Requests payment for a newly started saga.
    ///
    /// Moves the saga to `PaymentRequested`, the order to
    /// `PaymentRequested` and stages the payment command, atomically.
    #[tracing::instrument(skip(self), fields(correlation_id = %correlation_id))]
    pub async fn start_payment_request(
        &self,
        saga_id: &SagaId,
        correlation_id: CorrelationId,
    ) -> Result<()> {
        let mut saga = self.load_saga(saga_id).await?;
        let mut order = self.load_order(&saga).await?;
        let order_version = order.version();
        let observed_state = saga.state();

        saga.transition(SagaState::PaymentRequested)?;
        order.request_payment()?;

        let command = PaymentRequestCommand {
            order_id: order.order_id().clone(),
            user_id: order.user_id().clone(),
            saga_id: *saga_id,
            amount: order.total_amount(),
            correlation_id,
            timestamp: Utc::now(),
        };
        let entry = outbox::record(order.order_id().as_str(), &command)?;

        self.store
            .commit(
                UnitOfWork::new()
                    .update_order(order, order_version)
                    .update_saga(saga, observed_state)
                    .enqueue(entry),
            )
            .await?;

        tracing::info!(saga_id = %saga_id, "payment requested");
        Ok(())
    }

    /// Handles a payment success event from the payment service.
    ///
    /// Confirms the order, completes the saga and stages the confirmed
    /// event plus the user notification. Redelivery to a finished saga
    /// is absorbed as a no-op. An internal failure while applying the
    /// event fails the saga instead of bubbling up, so the ingress loop
    /// keeps consuming.
    #[tracing::instrument(skip(self, event), fields(saga_id = %event.saga_id, correlation_id = %event.correlation_id))]
    pub async fn handle_payment_success(&self, event: &PaymentSucceededEvent) -> Result<()> {
        let saga = self.load_saga(&event.saga_id).await?;
        if saga.state().is_terminal() {
            metrics::counter!("saga_duplicate_events").increment(1);
            tracing::warn!(state = %saga.state(), "payment success for finished saga, ignoring");
            return Ok(());
        }

        if let Err(e) = self.apply_payment_success(saga, event).await {
            tracing::error!(error = %e, "failed to apply payment success, failing saga");
            self.fail_saga(&event.saga_id).await;
        }
        Ok(())
    }

    async fn apply_payment_success(
        &self,
        mut saga: OrderSaga,
        event: &PaymentSucceededEvent,
    ) -> Result<()> {
        let mut order = self.load_order(&saga).await?;
        let order_version = order.version();
        let observed_state = saga.state();

        saga.transition(SagaState::PaymentSucceeded)?;
        order.confirm(event.payment_id.clone())?;
        saga.transition(SagaState::Completed)?;

        let confirmed = OrderConfirmedEvent {
            order_id: order.order_id().clone(),
            user_id: order.user_id().clone(),
            saga_id: *saga.saga_id(),
            payment_id: event.payment_id.clone(),
            correlation_id: event.correlation_id.clone(),
            timestamp: Utc::now(),
        };
        let notification = NotificationCommand {
            user_id: order.user_id().clone(),
            order_id: order.order_id().clone(),
            saga_id: *saga.saga_id(),
            notification_type: "ORDER_CONFIRMED".to_string(),
            message: format!("Your order {} has been confirmed.", order.order_id()),
            correlation_id: event.correlation_id.clone(),
            timestamp: Utc::now(),
        };
        let aggregate_id = order.order_id().as_str().to_string();
        let confirmed_entry = outbox::record(&aggregate_id, &confirmed)?;
        let notification_entry = outbox::record(&aggregate_id, &notification)?;

        self.store
            .commit(
                UnitOfWork::new()
                    .update_order(order, order_version)
                    .update_saga(saga, observed_state)
                    .enqueue(confirmed_entry)
                    .enqueue(notification_entry),
            )
            .await?;

        metrics::counter!("sagas_completed").increment(1);
        tracing::info!("saga completed");
        Ok(())
    }

    /// Handles a payment failure event by compensating the order.
    ///
    /// Cancels the order and runs the saga through its compensation
    /// states. Redelivery to a finished saga is absorbed as a no-op.
    #[tracing::instrument(skip(self, event), fields(saga_id = %event.saga_id, correlation_id = %event.correlation_id))]
    pub async fn handle_payment_failure(&self, event: &PaymentFailedEvent) -> Result<()> {
        let saga = self.load_saga(&event.saga_id).await?;
        if saga.state().is_terminal() {
            metrics::counter!("saga_duplicate_events").increment(1);
            tracing::warn!(state = %saga.state(), "payment failure for finished saga, ignoring");
            return Ok(());
        }

        if let Err(e) = self.apply_payment_failure(saga, event).await {
            tracing::error!(error = %e, "failed to compensate order, failing saga");
            self.fail_saga(&event.saga_id).await;
        }
        Ok(())
    }

    async fn apply_payment_failure(
        &self,
        mut saga: OrderSaga,
        event: &PaymentFailedEvent,
    ) -> Result<()> {
        let mut order = self.load_order(&saga).await?;
        let order_version = order.version();
        let observed_state = saga.state();

        saga.transition(SagaState::PaymentFailed)?;
        saga.transition(SagaState::Compensating)?;
        order.cancel()?;

        let cancelled = OrderCancelledEvent {
            order_id: order.order_id().clone(),
            user_id: order.user_id().clone(),
            saga_id: *saga.saga_id(),
            reason: event.reason.clone(),
            correlation_id: event.correlation_id.clone(),
            timestamp: Utc::now(),
        };
        let entry = outbox::record(order.order_id().as_str(), &cancelled)?;

        saga.transition(SagaState::Compensated)?;

        self.store
            .commit(
                UnitOfWork::new()
                    .update_order(order, order_version)
                    .update_saga(saga, observed_state)
                    .enqueue(entry),
            )
            .await?;

        metrics::counter!("sagas_compensated").increment(1);
        tracing::info!(reason = %event.reason, "saga compensated");
        Ok(())
    }

    /// Marks the saga (and its order, where the state machine permits)
    /// as failed. Best effort: errors here are logged, never returned,
    /// so the original failure stays the visible one.
    ///
    /// The saga is reloaded first. A concurrent handler may have
    /// finished it between the caller's read and the failed apply; a
    /// terminal saga must not be overwritten.
    async fn fail_saga(&self, saga_id: &SagaId) {
        let mut saga = match self.load_saga(saga_id).await {
            Ok(saga) => saga,
            Err(e) => {
                tracing::error!(error = %e, "could not reload saga to fail it");
                return;
            }
        };
        if saga.state().is_terminal() {
            tracing::warn!(state = %saga.state(), "saga already finished, not failing it");
            return;
        }
        let observed_state = saga.state();
        if let Err(e) = saga.transition(SagaState::Failed) {
            tracing::error!(error = %e, "could not move saga to failed state");
            return;
        }

        let mut work = UnitOfWork::new().update_saga(saga.clone(), observed_state);
        match self.store.get_order(saga.order_id()).await {
            Ok(Some(mut order)) if order.status().can_fail() => {
                let order_version = order.version();
                if order.fail().is_ok() {
                    work = work.update_order(order, order_version);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "could not load order while failing saga");
            }
        }

        if let Err(e) = self.store.commit(work).await {
            tracing::error!(error = %e, saga_id = %saga.saga_id(), "could not persist failed saga");
            return;
        }
        metrics::counter!("sagas_failed").increment(1);
    }

    /// Finds sagas stuck in a non-terminal state past `threshold` and
    /// logs each one for operator attention. Detection only, nothing is
    /// mutated.
    #[tracing::instrument(skip(self))]
    pub async fn recover_stalled_sagas(
        &self,
        threshold: chrono::Duration,
    ) -> Result<Vec<OrderSaga>> {
        let cutoff = Utc::now() - threshold;
        let stalled = self.store.find_stalled_sagas(cutoff).await?;

        for saga in &stalled {
            tracing::warn!(
                saga_id = %saga.saga_id(),
                order_id = %saga.order_id(),
                state = %saga.state(),
                last_updated = %saga.last_updated(),
                "stalled saga detected"
            );
        }
        metrics::gauge!("sagas_stalled").set(stalled.len() as f64);
        Ok(stalled)
    }
}
