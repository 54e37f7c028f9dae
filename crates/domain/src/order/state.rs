//! Order state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Paid ──► Shipped ──► Delivered
///    │            │           │
///    └────────────┴───────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, discount may still be applied.
    #[default]
    Pending,

    /// Accepted by the customer or back office, awaiting payment.
    Confirmed,

    Paid,

    /// Handed to the carrier. Cancellation is no longer possible.
    Shipped,

    /// Terminal.
    Delivered,

    /// Terminal.
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn can_apply_discount(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Paid
        )
    }

    /// Whether `action` is allowed from this status.
    pub fn allows(&self, action: OrderAction) -> bool {
        match action {
            OrderAction::ApplyDiscount => self.can_apply_discount(),
            OrderAction::Confirm => self.can_confirm(),
            OrderAction::Pay => self.can_pay(),
            OrderAction::Ship => self.can_ship(),
            OrderAction::Deliver => self.can_deliver(),
            OrderAction::Cancel => self.can_cancel(),
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Operations that move an order through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderAction {
    ApplyDiscount,
    Confirm,
    Pay,
    Ship,
    Deliver,
    Cancel,
}

impl OrderAction {
    pub const ALL: [OrderAction; 6] = [
        OrderAction::ApplyDiscount,
        OrderAction::Confirm,
        OrderAction::Pay,
        OrderAction::Ship,
        OrderAction::Deliver,
        OrderAction::Cancel,
    ];

    /// Code reported when the action is refused in the current status.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrderAction::ApplyDiscount => "ORDER_002",
            OrderAction::Confirm => "ORDER_004",
            OrderAction::Pay => "ORDER_005",
            OrderAction::Deliver => "ORDER_007",
            OrderAction::Cancel => "ORDER_008",
            OrderAction::Ship => "ORDER_010",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::ApplyDiscount => "apply discount",
            OrderAction::Confirm => "confirm",
            OrderAction::Pay => "pay",
            OrderAction::Ship => "ship",
            OrderAction::Deliver => "deliver",
            OrderAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
