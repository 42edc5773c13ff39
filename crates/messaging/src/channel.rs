//! Channel abstraction for sending messages to the broker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::message::{Message, Topic};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("send failed on topic {topic}: {reason}")]
    SendFailed { topic: Topic, reason: String },
}

/// Transport the outbox relay publishes through.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), ChannelError>;
}

/// In-memory channel for testing and local development. Messages are
/// appended per topic in send order.
#[derive(Clone, Default)]
pub struct InMemoryMessageChannel {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    topics: HashMap<Topic, Vec<Message>>,
    fail_on_send: bool,
    failing_keys: HashSet<String>,
}

impl InMemoryMessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail. Test helper.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.inner.write().await.fail_on_send = fail;
    }

    /// Makes sends with the given message key fail; other keys keep
    /// delivering. Test helper.
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.inner.write().await.failing_keys.insert(key.into());
    }

    pub async fn restore_key(&self, key: &str) {
        self.inner.write().await.failing_keys.remove(key);
    }

    /// Returns all messages sent to a topic, in send order.
    pub async fn messages(&self, topic: Topic) -> Vec<Message> {
        self.inner
            .read()
            .await
            .topics
            .get(&topic)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear(&self) {
        self.inner.write().await.topics.clear();
    }
}

#[async_trait]
impl MessageChannel for InMemoryMessageChannel {
    async fn send(&self, message: Message) -> Result<(), ChannelError> {
        let mut inner = self.inner.write().await;
        if inner.fail_on_send || inner.failing_keys.contains(&message.key) {
            return Err(ChannelError::SendFailed {
                topic: message.topic,
                reason: "simulated send failure".to_string(),
            });
        }
        inner.topics.entry(message.topic).or_default().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageHeaders;
    use serde_json::json;

    fn test_message(topic: Topic, event_type: &str) -> Message {
        Message::new(
            topic,
            "ORD-0000000001",
            MessageHeaders {
                event_type: event_type.to_string(),
                aggregate_type: "Order".to_string(),
                aggregate_id: "ORD-0000000001".to_string(),
            },
            json!({}),
        )
    }

    #[tokio::test]
    async fn send_appends_per_topic_in_order() {
        let channel = InMemoryMessageChannel::new();
        channel
            .send(test_message(Topic::OrderEvents, "OrderCreated"))
            .await
            .unwrap();
        channel
            .send(test_message(Topic::PaymentCommands, "PaymentRequested"))
            .await
            .unwrap();
        channel
            .send(test_message(Topic::OrderEvents, "OrderConfirmed"))
            .await
            .unwrap();

        let orders = channel.messages(Topic::OrderEvents).await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].headers.event_type, "OrderCreated");
        assert_eq!(orders[1].headers.event_type, "OrderConfirmed");
        assert_eq!(channel.messages(Topic::PaymentCommands).await.len(), 1);
    }

    #[tokio::test]
    async fn fail_on_send_surfaces_channel_error() {
        let channel = InMemoryMessageChannel::new();
        channel.set_fail_on_send(true).await;

        let result = channel
            .send(test_message(Topic::OrderEvents, "OrderCreated"))
            .await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));

        channel.set_fail_on_send(false).await;
        channel
            .send(test_message(Topic::OrderEvents, "OrderCreated"))
            .await
            .unwrap();
        assert_eq!(channel.messages(Topic::OrderEvents).await.len(), 1);
    }

    #[tokio::test]
    async fn failing_key_leaves_other_keys_deliverable() {
        let channel = InMemoryMessageChannel::new();
        channel.fail_key("ORD-A").await;

        let keyed = |key: &str| {
            Message::new(
                Topic::OrderEvents,
                key,
                MessageHeaders {
                    event_type: "OrderCreated".to_string(),
                    aggregate_type: "Order".to_string(),
                    aggregate_id: key.to_string(),
                },
                json!({}),
            )
        };

        let result = channel.send(keyed("ORD-A")).await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
        channel.send(keyed("ORD-B")).await.unwrap();

        channel.restore_key("ORD-A").await;
        channel.send(keyed("ORD-A")).await.unwrap();

        let sent = channel.messages(Topic::OrderEvents).await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].key, "ORD-B");
        assert_eq!(sent[1].key, "ORD-A");
    }
}
