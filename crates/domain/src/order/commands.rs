//! Order commands.
//!
//! Commands carry raw caller input. [`CreateOrder`] is validated into value
//! objects by [`CreateOrder::validate`]; the others only name the target
//! order and the parameters of the transition.

use common::AggregateId;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{CustomerId, Email, Money, OrderError, OrderItem};

/// One line of a new order, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl NewOrderItem {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            currency: default_currency(),
        }
    }

    pub fn in_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    fn validate(&self) -> Result<OrderItem, OrderError> {
        let unit_price = Money::new(self.unit_price, &self.currency)?;
        OrderItem::new(
            self.product_id.as_str(),
            self.product_name.as_str(),
            self.quantity,
            unit_price,
        )
    }
}

/// Command to create a new order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateOrder {
    pub customer_id: String,
    pub customer_email: String,
    pub items: Vec<NewOrderItem>,
}

/// Validated contents of a [`CreateOrder`].
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub customer_id: CustomerId,
    pub customer_email: Email,
    pub items: Vec<OrderItem>,
}

impl CreateOrder {
    pub fn new(
        customer_id: impl Into<String>,
        customer_email: impl Into<String>,
        items: Vec<NewOrderItem>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            customer_email: customer_email.into(),
            items,
        }
    }

    /// Checks the customer, email and every item, stopping at the first error.
    pub fn validate(&self) -> Result<ValidatedOrder, OrderError> {
        let customer_id = CustomerId::new(self.customer_id.as_str())?;
        let customer_email = Email::parse(&self.customer_email)?;
        let items = self
            .items
            .iter()
            .map(NewOrderItem::validate)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedOrder {
            customer_id,
            customer_email,
            items,
        })
    }
}

/// Command to confirm a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOrder {
    pub order_id: AggregateId,
}

impl ConfirmOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

/// Command to record payment for a confirmed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayOrder {
    pub order_id: AggregateId,
}

impl PayOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipOrder {
    pub order_id: AggregateId,
}

impl ShipOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverOrder {
    pub order_id: AggregateId,
}

impl DeliverOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrder {
    pub order_id: AggregateId,

    /// Free text carried on the `OrderCancelled` event.
    pub reason: String,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

/// Command to discount a pending order by a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyDiscount {
    pub order_id: AggregateId,
    pub percentage: Decimal,
}

impl ApplyDiscount {
    pub fn new(order_id: AggregateId, percentage: Decimal) -> Self {
        Self {
            order_id,
            percentage,
        }
    }
}
