//! Transactional outbox relay.
//!
//! Domain operations stage [`NewOutboxEntry`] rows in the same unit of
//! work as their state changes; the [`OutboxRelay`] polls unpublished
//! entries and forwards them to the broker with at-least-once delivery.

mod relay;

use domain::{AGGREGATE_TYPE_ORDER, NewOutboxEntry};
use messaging::EventPayload;

pub use relay::OutboxRelay;

/// Stages an event payload as an outbox entry for an order aggregate.
pub fn record(
    aggregate_id: &str,
    payload: &impl EventPayload,
) -> Result<NewOutboxEntry, serde_json::Error> {
    Ok(NewOutboxEntry::new(
        AGGREGATE_TYPE_ORDER,
        aggregate_id,
        payload.event_type(),
        serde_json::to_value(payload)?,
    ))
}
