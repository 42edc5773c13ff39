//! Saga orchestration for the order payment workflow.
//!
//! The [`SagaOrchestrator`] drives each order through payment and, on
//! failure, through compensation. Every step updates the saga record,
//! the order and the outbox in a single atomic commit. The
//! [`EventIngress`] feeds inbound payment events from the broker into
//! the orchestrator.

mod error;
mod ingress;
mod orchestrator;

pub use error::{Result, SagaError};
pub use ingress::EventIngress;
pub use orchestrator::SagaOrchestrator;
