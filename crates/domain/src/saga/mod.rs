//! Saga workflow record and state machine.

mod record;
mod state;

pub use record::{OrderSaga, SagaTransitionError};
pub use state::SagaState;
