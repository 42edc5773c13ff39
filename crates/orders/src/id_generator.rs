//! Order id generation.

use common::OrderId;
use rand::Rng;
use store::Store;

use crate::error::{OrderServiceError, Result};

const MAX_ATTEMPTS: u32 = 10;

/// Mints order ids of the form `ORD-` followed by ten random decimal
/// digits, checking the store for collisions.
pub struct OrderIdGenerator<S> {
    store: S,
}

impl<S: Store> OrderIdGenerator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Generates a fresh order id not yet present in the store.
    ///
    /// Retries on collision up to a fixed limit; exhausting the limit
    /// means the id space is effectively saturated and the request
    /// cannot proceed.
    pub async fn generate(&self) -> Result<OrderId> {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = Self::random_id();
            if !self.store.order_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::warn!(
                order_id = %candidate,
                attempt,
                "order id collision, retrying"
            );
        }
        Err(OrderServiceError::IdGenerationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    fn random_id() -> OrderId {
        let digits = rand::rng().random_range(1_000_000_000u64..10_000_000_000u64);
        OrderId::new(format!("ORD-{digits}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use store::InMemoryStore;

    #[tokio::test]
    async fn generated_ids_have_the_expected_shape() {
        let generator = OrderIdGenerator::new(InMemoryStore::new());
        let id = generator.generate().await.unwrap();

        let id = id.as_str();
        assert_eq!(id.len(), 14);
        assert!(id.starts_with("ORD-"));
        assert!(id[4..].chars().all(|c| c.is_ascii_digit()));
        assert_ne!(&id[4..5], "0");
    }

    #[tokio::test]
    async fn ten_thousand_ids_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(OrderIdGenerator::<InMemoryStore>::random_id()));
        }
    }
}
