//! Background worker wiring.

use messaging::{Message, MessageChannel};
use outbox::OutboxRelay;
use saga::{EventIngress, SagaOrchestrator};
use store::Store;
use tokio::sync::{mpsc, watch};

use crate::Config;

/// The background machinery of the order service: the outbox relay, the
/// payment event ingress and the stalled saga sweep, wired over one
/// store and one broker channel.
pub struct Worker<S, C> {
    relay: OutboxRelay<S, C>,
    ingress: EventIngress<S>,
    orchestrator: SagaOrchestrator<S>,
    inbound_rx: mpsc::Receiver<Message>,
    sweep_interval: std::time::Duration,
    stalled_threshold: chrono::Duration,
}

impl<S, C> Worker<S, C>
where
    S: Store + Clone + 'static,
    C: MessageChannel + 'static,
{
    /// Builds the worker and returns the sender a broker consumer
    /// delivers inbound payment events to.
    pub fn new(store: S, channel: C, config: &Config) -> (Self, mpsc::Sender<Message>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let worker = Self {
            relay: OutboxRelay::new(
                store.clone(),
                channel,
                config.publish_interval(),
                config.cleanup_interval(),
                config.retention(),
            ),
            ingress: EventIngress::new(SagaOrchestrator::new(store.clone())),
            orchestrator: SagaOrchestrator::new(store),
            inbound_rx,
            sweep_interval: config.sweep_interval(),
            stalled_threshold: config.stalled_threshold(),
        };
        (worker, inbound_tx)
    }

    /// Runs every background task until `shutdown` flips to true, then
    /// joins them.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let relay = self.relay;
        let relay_shutdown = shutdown.clone();
        let relay_handle = tokio::spawn(async move { relay.run(relay_shutdown).await });

        let ingress = self.ingress;
        let inbound_rx = self.inbound_rx;
        let ingress_shutdown = shutdown.clone();
        let ingress_handle =
            tokio::spawn(async move { ingress.run(inbound_rx, ingress_shutdown).await });

        let orchestrator = self.orchestrator;
        let threshold = self.stalled_threshold;
        let sweep_interval = self.sweep_interval;
        let mut sweep_shutdown = shutdown;
        let sweep_handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = orchestrator.recover_stalled_sagas(threshold).await {
                            tracing::error!(error = %e, "stalled saga sweep failed");
                        }
                    }
                    changed = sweep_shutdown.changed() => {
                        if changed.is_err() || *sweep_shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        });

        let _ = tokio::join!(relay_handle, ingress_handle, sweep_handle);
    }
}
