//! Broker topics and the outbound message envelope.

use serde::{Deserialize, Serialize};

/// Destination topics for published messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    OrderEvents,
    PaymentCommands,
    NotificationCommands,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrderEvents => "orders.events",
            Topic::PaymentCommands => "payments.commands",
            Topic::NotificationCommands => "notifications.commands",
        }
    }

    /// Routes an event type to its topic. Unrecognized event types go
    /// to the order events topic.
    pub fn for_event_type(event_type: &str) -> Topic {
        match event_type {
            "PaymentRequested" => Topic::PaymentCommands,
            "NotificationRequested" => Topic::NotificationCommands,
            _ => Topic::OrderEvents,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headers attached to every published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeaders {
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
}

/// A message bound for the broker. The key carries the aggregate id so
/// the broker partitions all messages for one aggregate together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub topic: Topic,
    pub key: String,
    pub headers: MessageHeaders,
    pub body: serde_json::Value,
}

impl Message {
    pub fn new(
        topic: Topic,
        key: impl Into<String>,
        headers: MessageHeaders,
        body: serde_json::Value,
    ) -> Self {
        Self {
            topic,
            key: key.into(),
            headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_events_route_to_orders_topic() {
        for event_type in ["OrderCreated", "OrderConfirmed", "OrderCancelled"] {
            assert_eq!(Topic::for_event_type(event_type), Topic::OrderEvents);
        }
    }

    #[test]
    fn command_events_route_to_command_topics() {
        assert_eq!(
            Topic::for_event_type("PaymentRequested"),
            Topic::PaymentCommands
        );
        assert_eq!(
            Topic::for_event_type("NotificationRequested"),
            Topic::NotificationCommands
        );
    }

    #[test]
    fn unknown_event_types_default_to_orders_topic() {
        assert_eq!(Topic::for_event_type("SomethingElse"), Topic::OrderEvents);
    }

    #[test]
    fn topic_names() {
        assert_eq!(Topic::OrderEvents.as_str(), "orders.events");
        assert_eq!(Topic::PaymentCommands.as_str(), "payments.commands");
        assert_eq!(Topic::NotificationCommands.as_str(), "notifications.commands");
    }
}
