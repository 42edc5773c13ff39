//! Order placement and queries.
//!
//! [`OrderService`] is the write path for new orders: it runs the
//! idempotency guard, mints an order id, opens the saga and stages the
//! creation event in one atomic commit.

mod error;
mod id_generator;
mod idempotency;
mod service;

pub use error::{OrderServiceError, Result};
pub use id_generator::OrderIdGenerator;
pub use idempotency::IdempotencyGuard;
pub use service::{OrderService, PlaceOrder, PlaceOrderLine, PlacedOrder};
