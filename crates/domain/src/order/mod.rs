//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod memory;
mod pricing;
mod service;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderParts};
pub use commands::*;
pub use events::{
    OrderCancelledData, OrderConfirmedData, OrderCreatedData, OrderEvent, OrderEventKind,
    OrderPaidData,
};
pub use memory::InMemoryOrderRepository;
pub use pricing::{DiscountPolicy, PriceRange};
pub use service::{CommandResult, OrderService};
pub use state::{OrderAction, OrderStatus};
pub use value_objects::{CustomerId, Email, Money, MoneyError, OrderItem, ProductId};

use common::AggregateId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Business rule violations raised by the order aggregate.
///
/// Every variant maps to a stable client-facing code through [`OrderError::code`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// An order needs at least one item.
    #[error("Order must contain at least one item")]
    NoItems,

    /// The operation is not allowed in the current status.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: OrderAction,
    },

    /// A discount was already applied, automatically or explicitly.
    #[error("Discount has already been applied")]
    DiscountAlreadyApplied,

    #[error("Discount percentage must be between 0 and 1, got {0}")]
    InvalidDiscountPercentage(Decimal),

    #[error("Order not found: {0}")]
    NotFound(AggregateId),

    #[error("Order total {total} is outside the allowed range {min} to {max}")]
    TotalOutOfRange {
        total: Money,
        min: Decimal,
        max: Decimal,
    },

    #[error("Customer ID is required")]
    CustomerIdRequired,

    #[error("Product ID is required")]
    ProductIdRequired,

    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("Invalid quantity for {product_id}: must be between 1 and {max}", max = OrderItem::MAX_QUANTITY)]
    InvalidQuantity { product_id: String },

    #[error("Invalid amount: {0}")]
    Money(#[from] MoneyError),
}

impl OrderError {
    /// Stable error code exposed to callers.
    ///
    /// Codes run from `ORDER_001` to `ORDER_010`; `ORDER_010` is shipping an
    /// order that is not paid. Input validation failures are `INVALID_INPUT`.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::NoItems => "ORDER_001",
            OrderError::InvalidStateTransition { action, .. } => action.error_code(),
            OrderError::DiscountAlreadyApplied => "ORDER_002",
            OrderError::InvalidDiscountPercentage(_) => "ORDER_003",
            OrderError::NotFound(_) => "ORDER_006",
            OrderError::TotalOutOfRange { .. } => "ORDER_009",
            OrderError::CustomerIdRequired
            | OrderError::ProductIdRequired
            | OrderError::InvalidEmail(_)
            | OrderError::InvalidQuantity { .. }
            | OrderError::Money(_) => "INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn transition(current_state: OrderStatus, action: OrderAction) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state,
            action,
        }
    }

    #[test]
    fn codes_follow_the_published_table() {
        assert_eq!(OrderError::NoItems.code(), "ORDER_001");
        assert_eq!(OrderError::DiscountAlreadyApplied.code(), "ORDER_002");
        assert_eq!(
            transition(OrderStatus::Paid, OrderAction::ApplyDiscount).code(),
            "ORDER_002"
        );
        assert_eq!(
            OrderError::InvalidDiscountPercentage(dec!(2)).code(),
            "ORDER_003"
        );
        assert_eq!(
            transition(OrderStatus::Paid, OrderAction::Confirm).code(),
            "ORDER_004"
        );
        assert_eq!(
            transition(OrderStatus::Pending, OrderAction::Pay).code(),
            "ORDER_005"
        );
        assert_eq!(OrderError::NotFound(AggregateId::new()).code(), "ORDER_006");
        assert_eq!(
            transition(OrderStatus::Paid, OrderAction::Deliver).code(),
            "ORDER_007"
        );
        assert_eq!(
            transition(OrderStatus::Shipped, OrderAction::Cancel).code(),
            "ORDER_008"
        );
        assert_eq!(
            transition(OrderStatus::Confirmed, OrderAction::Ship).code(),
            "ORDER_010"
        );
    }

    #[test]
    fn validation_errors_share_input_code() {
        assert_eq!(OrderError::InvalidEmail("x".into()).code(), "INVALID_INPUT");
        assert_eq!(
            OrderError::Money(MoneyError::Negative(dec!(-1))).code(),
            "INVALID_INPUT"
        );
    }

    #[test]
    fn transition_message_names_action_and_state() {
        assert_eq!(
            transition(OrderStatus::Delivered, OrderAction::Cancel).to_string(),
            "Invalid state transition: cannot cancel from DELIVERED state"
        );
    }
}
