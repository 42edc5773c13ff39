use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order id generation exhausted after {attempts} attempts")]
    IdGenerationExhausted { attempts: u32 },

    #[error(transparent)]
    Order(#[from] domain::OrderError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrderServiceError>;
