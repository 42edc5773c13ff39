//! Domain layer for the order orchestration service.
//!
//! This crate provides the persistent domain types and their pure logic:
//! - Order aggregate with an explicit status state machine
//! - OrderSaga workflow record with monotonic state transitions
//! - Transactional outbox entry records
//! - Idempotency records with expiry
//!
//! No I/O happens here; the `store` crate persists these types.

pub mod idempotency;
pub mod order;
pub mod outbox;
pub mod saga;

pub use idempotency::IdempotencyRecord;
pub use order::{Money, Order, OrderError, OrderLine, OrderStatus, ProductId};
pub use outbox::{AGGREGATE_TYPE_ORDER, NewOutboxEntry, OutboxEntry};
pub use saga::{OrderSaga, SagaState, SagaTransitionError};
