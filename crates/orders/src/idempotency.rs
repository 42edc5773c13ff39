//! Idempotency guard for order placement.

use domain::IdempotencyRecord;
use store::{Store, StoreError};

use crate::error::Result;
use crate::service::PlacedOrder;

/// Replays cached responses for repeated idempotency keys.
pub struct IdempotencyGuard<S> {
    store: S,
    ttl: chrono::Duration,
}

impl<S: Store> IdempotencyGuard<S> {
    pub fn new(store: S, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the cached response for `key` if a live record exists.
    /// Expired records are treated as absent.
    pub async fn check(&self, key: &str) -> Result<Option<PlacedOrder>> {
        match self.store.get_idempotency_record(key).await? {
            Some(record) if !record.is_expired(chrono::Utc::now()) => {
                metrics::counter!("orders_idempotent_replays").increment(1);
                tracing::info!(key, "replaying cached response for idempotency key");
                Ok(Some(serde_json::from_value(record.response_payload)?))
            }
            _ => Ok(None),
        }
    }

    /// Caches `response` under `key`.
    ///
    /// Losing a concurrent race for the same key is not an error: the
    /// winner's record stands and this caller keeps its own response.
    pub async fn store(&self, key: &str, response: &PlacedOrder) -> Result<()> {
        let record = IdempotencyRecord::new(key, serde_json::to_value(response)?, self.ttl);
        match self.store.put_idempotency_record(record).await {
            Ok(()) => Ok(()),
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                tracing::warn!(key, "concurrent idempotency key insert, keeping winner");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
