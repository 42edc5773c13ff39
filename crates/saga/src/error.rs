use common::{OrderId, SagaId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga not found: {0}")]
    SagaNotFound(SagaId),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    InvalidTransition(#[from] domain::SagaTransitionError),

    #[error(transparent)]
    Order(#[from] domain::OrderError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SagaError>;
