//! Idempotency key records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cached response for a client-supplied idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub response_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: impl Into<String>, response_payload: serde_json::Value, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            response_payload,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_record_is_not_expired() {
        let record = IdempotencyRecord::new("key-1", json!({"ok": true}), Duration::hours(24));
        assert!(!record.is_expired(Utc::now()));
    }

    #[test]
    fn record_expires_after_ttl() {
        let record = IdempotencyRecord::new("key-1", json!({}), Duration::hours(24));
        assert!(record.is_expired(Utc::now() + Duration::hours(25)));
        assert!(record.is_expired(record.expires_at));
    }
}
