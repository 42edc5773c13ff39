//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use state::OrderStatus;
pub use value_objects::{Money, OrderLine, ProductId};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in a state that allows the requested transition.
    #[error("Invalid status transition: cannot {action} from {current_status} status")]
    InvalidStatusTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Order was created without any lines.
    #[error("Order has no lines")]
    NoLines,

    /// A line has a non-positive quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A line has a non-positive unit price.
    #[error("Invalid unit price: {cents} cents (must be greater than 0)")]
    InvalidUnitPrice { cents: i64 },

    /// The order total does not fit the supported amount range.
    #[error("Order total overflows the supported amount range")]
    AmountOverflow,
}
