//! Transactional outbox entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate type recorded on every order outbox entry.
pub const AGGREGATE_TYPE_ORDER: &str = "Order";

/// Outbox entry staged for insertion; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutboxEntry {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxEntry {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Persisted outbox entry awaiting (or finished with) publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Materializes a stored entry from a staged one plus its assigned id.
    pub fn from_new(id: i64, entry: NewOutboxEntry) -> Self {
        Self {
            id,
            aggregate_type: entry.aggregate_type,
            aggregate_id: entry.aggregate_id,
            event_type: entry.event_type,
            payload: entry.payload,
            created_at: entry.created_at,
            published: false,
            published_at: None,
        }
    }

    pub fn mark_published(&mut self, at: DateTime<Utc>) {
        self.published = true;
        self.published_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_entry_starts_unpublished() {
        let staged = NewOutboxEntry::new(
            AGGREGATE_TYPE_ORDER,
            "ORD-0000000001",
            "OrderCreated",
            json!({"order_id": "ORD-0000000001"}),
        );
        let entry = OutboxEntry::from_new(1, staged);

        assert_eq!(entry.id, 1);
        assert_eq!(entry.aggregate_type, "Order");
        assert!(!entry.published);
        assert!(entry.published_at.is_none());
    }

    #[test]
    fn mark_published_records_timestamp() {
        let mut entry = OutboxEntry::from_new(
            7,
            NewOutboxEntry::new(AGGREGATE_TYPE_ORDER, "ORD-1", "OrderConfirmed", json!({})),
        );
        let at = Utc::now();
        entry.mark_published(at);

        assert!(entry.published);
        assert_eq!(entry.published_at, Some(at));
    }
}
