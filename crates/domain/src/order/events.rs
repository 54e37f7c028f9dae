//! Order domain events.
//!
//! The set of event kinds is closed. Each kind carries its own routing
//! metadata, so the outbox router is derived from [`OrderEventKind::ALL`]
//! rather than maintained by hand.

use chrono::{DateTime, Utc};
use common::AggregateId;
use outbox::MessageRouter;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CustomerId, Email, Money};

/// Events raised by the order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated(OrderCreatedData),
    OrderConfirmed(OrderConfirmedData),
    OrderPaid(OrderPaidData),
    OrderCancelled(OrderCancelledData),
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub customer_email: Email,

    /// Sum of item subtotals before any discount.
    pub total_amount: Money,

    /// Amount due after the automatic discount.
    pub final_amount: Money,

    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    pub order_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub order_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub order_id: AggregateId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Discriminant of [`OrderEvent`] with its wire metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventKind {
    Created,
    Confirmed,
    Paid,
    Cancelled,
}

impl OrderEventKind {
    pub const ALL: [OrderEventKind; 4] = [
        OrderEventKind::Created,
        OrderEventKind::Confirmed,
        OrderEventKind::Paid,
        OrderEventKind::Cancelled,
    ];

    /// Name stored in the outbox `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "OrderCreated",
            OrderEventKind::Confirmed => "OrderConfirmed",
            OrderEventKind::Paid => "OrderPaid",
            OrderEventKind::Cancelled => "OrderCancelled",
        }
    }

    pub fn routing_key(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "order.created",
            OrderEventKind::Confirmed => "order.confirmed",
            OrderEventKind::Paid => "order.paid",
            OrderEventKind::Cancelled => "order.cancelled",
        }
    }

    /// Router covering every order event, falling back to `order.events`.
    pub fn router() -> MessageRouter {
        MessageRouter::from_routes(
            Self::ALL
                .into_iter()
                .map(|kind| (kind.event_type(), kind.routing_key())),
        )
    }
}

impl OrderEvent {
    pub fn order_created(
        order_id: AggregateId,
        customer_id: CustomerId,
        customer_email: Email,
        total_amount: Money,
        final_amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_id,
            customer_email,
            total_amount,
            final_amount,
            occurred_at,
        })
    }

    pub fn order_confirmed(order_id: AggregateId, occurred_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderConfirmed(OrderConfirmedData {
            order_id,
            occurred_at,
        })
    }

    pub fn order_paid(order_id: AggregateId, occurred_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderPaid(OrderPaidData {
            order_id,
            occurred_at,
        })
    }

    pub fn order_cancelled(
        order_id: AggregateId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            order_id,
            reason: reason.into(),
            occurred_at,
        })
    }

    pub fn kind(&self) -> OrderEventKind {
        match self {
            OrderEvent::OrderCreated(_) => OrderEventKind::Created,
            OrderEvent::OrderConfirmed(_) => OrderEventKind::Confirmed,
            OrderEvent::OrderPaid(_) => OrderEventKind::Paid,
            OrderEvent::OrderCancelled(_) => OrderEventKind::Cancelled,
        }
    }

    pub fn order_id(&self) -> AggregateId {
        match self {
            OrderEvent::OrderCreated(data) => data.order_id,
            OrderEvent::OrderConfirmed(data) => data.order_id,
            OrderEvent::OrderPaid(data) => data.order_id,
            OrderEvent::OrderCancelled(data) => data.order_id,
        }
    }

    pub fn routing_key(&self) -> &'static str {
        self.kind().routing_key()
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        self.kind().event_type()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(data) => data.occurred_at,
            OrderEvent::OrderConfirmed(data) => data.occurred_at,
            OrderEvent::OrderPaid(data) => data.occurred_at,
            OrderEvent::OrderCancelled(data) => data.occurred_at,
        }
    }
}
