//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► PaymentRequested ──► Confirmed ──► Shipped ──► Delivered
///    │               │
///    ├───────────────┴──► Cancelled
///    └── (any non-terminal) ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed, payment not yet requested.
    #[default]
    Pending,

    /// Payment has been requested from the payment service.
    PaymentRequested,

    /// Payment succeeded and the order is confirmed.
    Confirmed,

    /// Order has been handed to shipping.
    Shipped,

    /// Order reached the customer (terminal status).
    Delivered,

    /// Order was cancelled, e.g. by payment compensation (terminal status).
    Cancelled,

    /// Workflow hit an unrecoverable error (terminal status).
    Failed,
}

impl OrderStatus {
    /// Returns true if payment can be requested in this status.
    pub fn can_request_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be confirmed in this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::PaymentRequested)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PaymentRequested)
    }

    /// Returns true if the order can be marked failed in this status.
    pub fn can_fail(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the order can be shipped in this status.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    /// Returns true if the order can be delivered in this status.
    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::PaymentRequested => "PaymentRequested",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "PaymentRequested" => Ok(OrderStatus::PaymentRequested),
            "Confirmed" => Ok(OrderStatus::Confirmed),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
