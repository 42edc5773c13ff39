//! Inbound payment event consumption.

use messaging::{Message, PaymentEvent};
use store::Store;
use tokio::sync::{mpsc, watch};

use crate::error::Result;
use crate::orchestrator::SagaOrchestrator;

/// Feeds inbound payment events into the orchestrator.
pub struct EventIngress<S> {
    orchestrator: SagaOrchestrator<S>,
}

impl<S: Store> EventIngress<S> {
    pub fn new(orchestrator: SagaOrchestrator<S>) -> Self {
        Self { orchestrator }
    }

    /// Dispatches one inbound message.
    ///
    /// Event types outside the payment event set are logged and
    /// skipped; a malformed body for a known type is an error.
    #[tracing::instrument(skip(self, message), fields(event_type = %message.headers.event_type))]
    pub async fn handle_message(&self, message: &Message) -> Result<()> {
        match PaymentEvent::decode(&message.headers.event_type, &message.body)? {
            Some(PaymentEvent::Succeeded(event)) => {
                self.orchestrator.handle_payment_success(&event).await
            }
            Some(PaymentEvent::Failed(event)) => {
                self.orchestrator.handle_payment_failure(&event).await
            }
            None => {
                metrics::counter!("ingress_unknown_events").increment(1);
                tracing::warn!("ignoring unknown event type");
                Ok(())
            }
        }
    }

    /// Consumes messages until the channel closes or `shutdown` flips
    /// to true, then drains whatever is already queued.
    pub async fn run(&self, mut messages: mpsc::Receiver<Message>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                message = messages.recv() => {
                    match message {
                        Some(message) => self.dispatch(&message).await,
                        None => {
                            tracing::info!("ingress channel closed");
                            return;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        while let Ok(message) = messages.try_recv() {
                            self.dispatch(&message).await;
                        }
                        tracing::info!("event ingress stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, message: &Message) {
        if let Err(e) = self.handle_message(message).await {
            tracing::error!(
                event_type = %message.headers.event_type,
                error = %e,
                "failed to handle inbound event"
            );
        }
    }
}
