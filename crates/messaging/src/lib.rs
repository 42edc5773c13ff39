//! Message broker surface: topics, envelopes, event payloads and the
//! channel abstraction the outbox relay publishes through.

mod channel;
mod message;
mod payloads;

pub use channel::{ChannelError, InMemoryMessageChannel, MessageChannel};
pub use message::{Message, MessageHeaders, Topic};
pub use payloads::{
    EventPayload, NotificationCommand, OrderCancelledEvent, OrderConfirmedEvent, OrderCreatedEvent,
    OrderLinePayload, PaymentEvent, PaymentFailedEvent, PaymentRequestCommand,
    PaymentSucceededEvent,
};
