//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of an order workflow saga.
///
/// State transitions:
/// ```text
/// Started ──► PaymentRequested ──┬──► PaymentSucceeded ──► Completed
///                                └──► PaymentFailed ──► Compensating ──► Compensated
///
/// (any non-terminal) ──► Failed
/// ```
///
/// `Completed`, `Compensated` and `Failed` are terminal; once reached,
/// no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga created alongside the order, payment not yet requested.
    #[default]
    Started,

    /// Payment command has been enqueued for the payment service.
    PaymentRequested,

    /// Payment service reported success.
    PaymentSucceeded,

    /// Payment service reported failure; compensation pending.
    PaymentFailed,

    /// Compensation (order cancellation) is in progress.
    Compensating,

    /// Compensation finished (terminal state).
    Compensated,

    /// Workflow finished successfully (terminal state).
    Completed,

    /// Workflow hit an unrecoverable error (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Completed | SagaState::Compensated | SagaState::Failed
        )
    }

    /// Returns true if the state machine permits moving to `next`.
    ///
    /// `Failed` is reachable from any non-terminal state; all other
    /// transitions follow the forward/compensation paths.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::Started, SagaState::PaymentRequested)
                | (SagaState::PaymentRequested, SagaState::PaymentSucceeded)
                | (SagaState::PaymentRequested, SagaState::PaymentFailed)
                | (SagaState::PaymentSucceeded, SagaState::Completed)
                | (SagaState::PaymentFailed, SagaState::Compensating)
                | (SagaState::Compensating, SagaState::Compensated)
        ) || (next == SagaState::Failed && !self.is_terminal())
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "Started",
            SagaState::PaymentRequested => "PaymentRequested",
            SagaState::PaymentSucceeded => "PaymentSucceeded",
            SagaState::PaymentFailed => "PaymentFailed",
            SagaState::Compensating => "Compensating",
            SagaState::Compensated => "Compensated",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Started" => Ok(SagaState::Started),
            "PaymentRequested" => Ok(SagaState::PaymentRequested),
            "PaymentSucceeded" => Ok(SagaState::PaymentSucceeded),
            "PaymentFailed" => Ok(SagaState::PaymentFailed),
            "Compensating" => Ok(SagaState::Compensating),
            "Compensated" => Ok(SagaState::Compensated),
            "Completed" => Ok(SagaState::Completed),
            "Failed" => Ok(SagaState::Failed),
            other => Err(format!("unknown saga state: {other}")),
        }
    }
}
