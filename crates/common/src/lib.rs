mod types;

pub use types::{CorrelationId, OrderId, PaymentId, SagaId, UserId};
