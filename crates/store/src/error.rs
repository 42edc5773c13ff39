use common::{OrderId, SagaId};
use domain::SagaState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("saga not found: {0}")]
    SagaNotFound(SagaId),

    #[error("version conflict on order {order_id}: expected {expected}, found {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    #[error("state conflict on saga {saga_id}: expected {expected}, found {actual}")]
    SagaStateConflict {
        saga_id: SagaId,
        expected: SagaState,
        actual: SagaState,
    },

    #[error("order already exists: {0}")]
    DuplicateOrder(OrderId),

    #[error("saga already exists: {0}")]
    DuplicateSaga(SagaId),

    #[error("idempotency key already exists: {0}")]
    DuplicateIdempotencyKey(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
