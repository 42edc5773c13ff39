//! Order aggregate.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;
use super::state::OrderStatus;
use super::value_objects::{Money, OrderLine};

/// A customer order.
///
/// The total amount is computed once at creation from the lines and never
/// recomputed. Status changes go through the explicit transition methods,
/// which enforce the `OrderStatus` state machine. The version counter is
/// compared and incremented by the store layer on every update (optimistic
/// concurrency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    order_id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total_amount: Money,
    payment_id: Option<PaymentId>,
    shipping_address: String,
    lines: Vec<OrderLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl Order {
    /// Creates a new pending order, validating the lines and computing
    /// the total.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        shipping_address: impl Into<String>,
        lines: Vec<OrderLine>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        let mut total_amount = Money::zero();
        for line in &lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: line.quantity,
                });
            }
            if !line.unit_price.is_positive() {
                return Err(OrderError::InvalidUnitPrice {
                    cents: line.unit_price.cents(),
                });
            }
            total_amount = line
                .line_total()
                .and_then(|t| total_amount.checked_add(t))
                .ok_or(OrderError::AmountOverflow)?;
        }

        let now = Utc::now();

        Ok(Self {
            order_id,
            user_id,
            status: OrderStatus::Pending,
            total_amount,
            payment_id: None,
            shipping_address: shipping_address.into(),
            lines,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Rehydrates an order from stored fields without revalidation.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        order_id: OrderId,
        user_id: UserId,
        status: OrderStatus,
        total_amount: Money,
        payment_id: Option<PaymentId>,
        shipping_address: String,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            order_id,
            user_id,
            status,
            total_amount,
            payment_id,
            shipping_address,
            lines,
            created_at,
            updated_at,
            version,
        }
    }

    /// Marks payment as requested.
    pub fn request_payment(&mut self) -> Result<(), OrderError> {
        if !self.status.can_request_payment() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "request payment",
            });
        }
        self.status = OrderStatus::PaymentRequested;
        self.touch();
        Ok(())
    }

    /// Confirms the order, recording the payment reference.
    pub fn confirm(&mut self, payment_id: PaymentId) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "confirm",
            });
        }
        self.status = OrderStatus::Confirmed;
        self.payment_id = Some(payment_id);
        self.touch();
        Ok(())
    }

    /// Cancels the order (compensation path).
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "cancel",
            });
        }
        self.status = OrderStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Marks the order failed after an unrecoverable workflow error.
    pub fn fail(&mut self) -> Result<(), OrderError> {
        if !self.status.can_fail() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "fail",
            });
        }
        self.status = OrderStatus::Failed;
        self.touch();
        Ok(())
    }

    /// Marks the order shipped.
    pub fn ship(&mut self) -> Result<(), OrderError> {
        if !self.status.can_ship() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "ship",
            });
        }
        self.status = OrderStatus::Shipped;
        self.touch();
        Ok(())
    }

    /// Marks the order delivered.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        if !self.status.can_deliver() {
            return Err(OrderError::InvalidStatusTransition {
                current_status: self.status,
                action: "deliver",
            });
        }
        self.status = OrderStatus::Delivered;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns the business order ID.
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Returns the owning user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the total amount, fixed at creation.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the payment reference, set once payment succeeds.
    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.payment_id.as_ref()
    }

    /// Returns the shipping destination.
    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    /// Returns the ordered lines.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-update timestamp.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the optimistic-concurrency version counter.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Sets the version counter. Called by the store layer after a
    /// successful compare-and-increment; not for application use.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
