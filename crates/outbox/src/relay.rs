//! Background relay that publishes outbox entries to the broker.

use std::time::Duration;

use chrono::Utc;
use domain::OutboxEntry;
use messaging::{Message, MessageChannel, MessageHeaders, Topic};
use store::Store;
use tokio::sync::watch;

/// Polls unpublished outbox entries and forwards them to the broker.
///
/// Entries are published oldest first, so messages for one aggregate go
/// out in the order they were recorded. A failed send leaves its entry
/// unpublished for the next pass and never blocks other entries, which
/// gives at-least-once delivery. Marking an entry published happens in
/// its own store call, so a crash between send and mark produces a
/// duplicate rather than a loss.
pub struct OutboxRelay<S, C> {
    store: S,
    channel: C,
    publish_interval: Duration,
    cleanup_interval: Duration,
    retention: chrono::Duration,
}

impl<S: Store, C: MessageChannel> OutboxRelay<S, C> {
    pub fn new(
        store: S,
        channel: C,
        publish_interval: Duration,
        cleanup_interval: Duration,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            channel,
            publish_interval,
            cleanup_interval,
            retention,
        }
    }

    fn to_message(entry: &OutboxEntry) -> Message {
        Message::new(
            Topic::for_event_type(&entry.event_type),
            entry.aggregate_id.clone(),
            MessageHeaders {
                event_type: entry.event_type.clone(),
                aggregate_type: entry.aggregate_type.clone(),
                aggregate_id: entry.aggregate_id.clone(),
            },
            entry.payload.clone(),
        )
    }

    /// Publishes all pending entries. Returns how many were published.
    #[tracing::instrument(skip(self))]
    pub async fn publish_pending(&self) -> store::Result<usize> {
        let entries = self.store.unpublished_entries().await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut published = 0;
        for entry in &entries {
            match self.channel.send(Self::to_message(entry)).await {
                Ok(()) => {
                    self.store.mark_published(entry.id, Utc::now()).await?;
                    metrics::counter!("outbox_entries_published").increment(1);
                    published += 1;
                }
                Err(e) => {
                    metrics::counter!("outbox_publish_failures").increment(1);
                    tracing::warn!(
                        entry_id = entry.id,
                        event_type = %entry.event_type,
                        aggregate_id = %entry.aggregate_id,
                        error = %e,
                        "failed to publish outbox entry, will retry"
                    );
                }
            }
        }

        tracing::debug!(published, pending = entries.len(), "outbox pass complete");
        Ok(published)
    }

    /// Deletes published entries older than the retention window.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_published(&self) -> store::Result<u64> {
        let cutoff = Utc::now() - self.retention;
        let removed = self.store.delete_published_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "cleaned up published outbox entries");
        }
        Ok(removed)
    }

    /// Runs the relay until `shutdown` flips to true, then drains any
    /// remaining entries with one final pass.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut publish_tick = tokio::time::interval(self.publish_interval);
        let mut cleanup_tick = tokio::time::interval(self.cleanup_interval);

        loop {
            tokio::select! {
                _ = publish_tick.tick() => {
                    if let Err(e) = self.publish_pending().await {
                        tracing::error!(error = %e, "outbox publish pass failed");
                    }
                }
                _ = cleanup_tick.tick() => {
                    if let Err(e) = self.cleanup_published().await {
                        tracing::error!(error = %e, "outbox cleanup failed");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        if let Err(e) = self.publish_pending().await {
                            tracing::error!(error = %e, "outbox drain failed during shutdown");
                        }
                        tracing::info!("outbox relay stopped");
                        return;
                    }
                }
            }
        }
    }
}
