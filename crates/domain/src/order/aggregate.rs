//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use rust_decimal::Decimal;

use crate::aggregate::AggregateRoot;

use super::{
    CustomerId, DiscountPolicy, Email, Money, MoneyError, OrderAction, OrderError, OrderEvent,
    OrderItem, OrderStatus,
};

/// Order aggregate root.
///
/// Holds the current state of an order from creation to delivery or
/// cancellation. Every state-changing operation either fails without
/// touching the order or applies its change and, where the lifecycle step
/// is of interest to other systems, records a domain event.
#[derive(Debug, Clone)]
pub struct Order {
    id: AggregateId,
    customer_id: CustomerId,
    customer_email: Email,
    items: Vec<OrderItem>,
    status: OrderStatus,
    total_amount: Money,
    discount_amount: Option<Money>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
    pending_events: Vec<OrderEvent>,
}

/// Stored state of an order, used to rebuild it without raising events.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: AggregateId,
    pub customer_id: CustomerId,
    pub customer_email: Email,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub discount_amount: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl AggregateRoot for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn pending_events(&self) -> &[OrderEvent] {
        &self.pending_events
    }

    fn mark_persisted(&mut self) -> Vec<OrderEvent> {
        self.version += 1;
        std::mem::take(&mut self.pending_events)
    }
}

// Factories
impl Order {
    /// Creates a pending order with the default discount policy.
    pub fn create(
        customer_id: CustomerId,
        customer_email: Email,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        Self::create_with_policy(customer_id, customer_email, items, &DiscountPolicy::default())
    }

    /// Creates a pending order.
    ///
    /// The total is the sum of item subtotals, all in one currency, and must
    /// fall in the policy's price range. The automatic discount is applied
    /// before `OrderCreated` is raised, so the event carries the final amount.
    pub fn create_with_policy(
        customer_id: CustomerId,
        customer_email: Email,
        items: Vec<OrderItem>,
        policy: &DiscountPolicy,
    ) -> Result<Self, OrderError> {
        let (first, rest) = items.split_first().ok_or(OrderError::NoItems)?;
        let total_amount = first
            .subtotal()
            .and_then(|subtotal| {
                rest.iter()
                    .try_fold(subtotal, |total, item| total.add(&item.subtotal()?))
            })
            .map_err(|e| match e {
                MoneyError::Overflow => policy.price_range.overflowed(first.unit_price()),
                other => OrderError::Money(other),
            })?;
        policy.price_range.check(&total_amount)?;

        let total_quantity = items.iter().map(|item| u64::from(item.quantity())).sum();
        let rate = policy.rate_for(&total_amount, total_quantity);
        let discount_amount = if rate.is_zero() {
            None
        } else {
            Some(total_amount.discount(rate)?)
        };

        let now = Utc::now();
        let mut order = Self {
            id: AggregateId::new(),
            customer_id,
            customer_email,
            items,
            status: OrderStatus::Pending,
            total_amount,
            discount_amount,
            created_at: now,
            updated_at: now,
            version: 0,
            pending_events: Vec::new(),
        };

        let created = OrderEvent::order_created(
            order.id,
            order.customer_id.clone(),
            order.customer_email.clone(),
            order.total_amount.clone(),
            order.final_amount().clone(),
            now,
        );
        order.record(created);
        Ok(order)
    }

    /// Rebuilds an order from storage. Raises no events.
    pub fn reconstitute(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            customer_id: parts.customer_id,
            customer_email: parts.customer_email,
            items: parts.items,
            status: parts.status,
            total_amount: parts.total_amount,
            discount_amount: parts.discount_amount,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
            pending_events: Vec::new(),
        }
    }

    /// Copies the stored state out, without pending events.
    pub fn to_parts(&self) -> OrderParts {
        OrderParts {
            id: self.id,
            customer_id: self.customer_id.clone(),
            customer_email: self.customer_email.clone(),
            items: self.items.clone(),
            status: self.status,
            total_amount: self.total_amount.clone(),
            discount_amount: self.discount_amount.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn customer_email(&self) -> &Email {
        &self.customer_email
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Sum of item subtotals before discount.
    pub fn total_amount(&self) -> &Money {
        &self.total_amount
    }

    pub fn discount_amount(&self) -> Option<&Money> {
        self.discount_amount.as_ref()
    }

    /// Amount due: the discounted amount when a discount was applied.
    pub fn final_amount(&self) -> &Money {
        self.discount_amount.as_ref().unwrap_or(&self.total_amount)
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity())).sum()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Applies a one-off discount while the order is pending.
    pub fn apply_discount(&mut self, percentage: Decimal) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::ApplyDiscount)?;
        if percentage < Decimal::ZERO || percentage > Decimal::ONE {
            return Err(OrderError::InvalidDiscountPercentage(percentage));
        }
        if self.discount_amount.is_some() {
            return Err(OrderError::DiscountAlreadyApplied);
        }

        self.discount_amount = Some(self.total_amount.discount(percentage)?);
        self.touch();
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::Confirm)?;
        self.status = OrderStatus::Confirmed;
        let now = self.touch();
        self.record(OrderEvent::order_confirmed(self.id, now));
        Ok(())
    }

    pub fn pay(&mut self) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::Pay)?;
        self.status = OrderStatus::Paid;
        let now = self.touch();
        self.record(OrderEvent::order_paid(self.id, now));
        Ok(())
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::Ship)?;
        self.status = OrderStatus::Shipped;
        self.touch();
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::Deliver)?;
        self.status = OrderStatus::Delivered;
        self.touch();
        Ok(())
    }

    /// Cancels the order unless it has shipped, been delivered or was
    /// already cancelled.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.ensure_allowed(OrderAction::Cancel)?;
        self.status = OrderStatus::Cancelled;
        let now = self.touch();
        self.record(OrderEvent::order_cancelled(self.id, reason, now));
        Ok(())
    }

    fn ensure_allowed(&self, action: OrderAction) -> Result<(), OrderError> {
        if !self.status.allows(action) {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action,
            });
        }
        Ok(())
    }

    fn touch(&mut self) -> DateTime<Utc> {
        self.updated_at = Utc::now();
        self.updated_at
    }

    fn record(&mut self, event: OrderEvent) {
        self.pending_events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::aggregate::DomainEvent;

    fn usd(amount: Decimal) -> Money {
        Money::usd(amount).unwrap()
    }

    fn item(product: &str, quantity: u32, price: Decimal) -> OrderItem {
        OrderItem::new(product, format!("{product} name"), quantity, usd(price)).unwrap()
    }

    fn new_order(items: Vec<OrderItem>) -> Result<Order, OrderError> {
        Order::create(
            CustomerId::new("CUST-001").unwrap(),
            Email::parse("buyer@example.com").unwrap(),
            items,
        )
    }

    fn pending_order() -> Order {
        new_order(vec![item("prod-1", 2, dec!(100))]).unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = pending_order();
        let path: &[OrderAction] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Confirmed => &[OrderAction::Confirm],
            OrderStatus::Paid => &[OrderAction::Confirm, OrderAction::Pay],
            OrderStatus::Shipped => &[OrderAction::Confirm, OrderAction::Pay, OrderAction::Ship],
            OrderStatus::Delivered => &[
                OrderAction::Confirm,
                OrderAction::Pay,
                OrderAction::Ship,
                OrderAction::Deliver,
            ],
            OrderStatus::Cancelled => &[OrderAction::Cancel],
        };
        for action in path {
            perform(&mut order, *action).unwrap();
        }
        order.mark_persisted();
        order
    }

    fn perform(order: &mut Order, action: OrderAction) -> Result<(), OrderError> {
        match action {
            OrderAction::ApplyDiscount => order.apply_discount(dec!(0.1)),
            OrderAction::Confirm => order.confirm(),
            OrderAction::Pay => order.pay(),
            OrderAction::Ship => order.ship(),
            OrderAction::Deliver => order.deliver(),
            OrderAction::Cancel => order.cancel("test"),
        }
    }

    #[test]
    fn test_create_computes_total_and_raises_created() {
        let order = new_order(vec![item("prod-1", 2, dec!(100)), item("prod-2", 1, dec!(50))])
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount().amount(), dec!(250));
        assert!(order.discount_amount().is_none());
        assert_eq!(order.version(), 0);
        assert_eq!(order.created_at(), order.updated_at());

        let events = order.pending_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            OrderEvent::OrderCreated(data) => {
                assert_eq!(data.order_id, order.id());
                assert_eq!(data.total_amount.amount(), dec!(250));
                assert_eq!(data.final_amount.amount(), dec!(250));
                assert_eq!(data.customer_email.as_str(), "buyer@example.com");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_create_without_items_fails() {
        let err = new_order(vec![]).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
        assert_eq!(err.code(), "ORDER_001");
    }

    #[test]
    fn test_create_with_mixed_currencies_fails() {
        let eur = OrderItem::new("prod-2", "Euro thing", 1, Money::new(dec!(5), "EUR").unwrap())
            .unwrap();
        let err = new_order(vec![item("prod-1", 1, dec!(5)), eur]).unwrap_err();
        assert!(matches!(err, OrderError::Money(MoneyError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_create_outside_price_range_fails() {
        let err = new_order(vec![item("prod-1", 2, dec!(5000.01))]).unwrap_err();
        assert_eq!(err.code(), "ORDER_009");

        let err = new_order(vec![item("prod-1", 1, Decimal::ZERO)]).unwrap_err();
        assert_eq!(err.code(), "ORDER_009");
    }

    #[test]
    fn test_create_with_overflowing_total_is_out_of_range() {
        let err = new_order(vec![item("prod-1", 2, Decimal::MAX)]).unwrap_err();
        assert_eq!(err.code(), "ORDER_009");

        let err = new_order(vec![item("prod-1", 1, Decimal::MAX), item("prod-2", 1, dec!(1))])
            .unwrap_err();
        assert!(matches!(err, OrderError::TotalOutOfRange { .. }));
    }

    #[test]
    fn test_create_applies_capped_automatic_discount() {
        let items = vec![item("prod-1", 10, dec!(100)), item("prod-2", 1, dec!(200))];
        let order = new_order(items).unwrap();

        assert_eq!(order.total_amount().amount(), dec!(1200));
        assert_eq!(order.final_amount().amount(), dec!(1020));
        match &order.pending_events()[0] {
            OrderEvent::OrderCreated(data) => {
                assert_eq!(data.final_amount.amount(), dec!(1020))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_create_with_policy_without_discount() {
        let order = Order::create_with_policy(
            CustomerId::new("CUST-001").unwrap(),
            Email::parse("buyer@example.com").unwrap(),
            vec![item("prod-1", 12, dec!(100))],
            &DiscountPolicy::none(),
        )
        .unwrap();
        assert!(order.discount_amount().is_none());
    }

    #[test]
    fn test_apply_discount_once() {
        let mut order = pending_order();
        order.apply_discount(dec!(0.25)).unwrap();

        assert_eq!(order.final_amount().amount(), dec!(150));
        assert_eq!(order.total_amount().amount(), dec!(200));
        assert_eq!(order.pending_events().len(), 1);

        let err = order.apply_discount(dec!(0.1)).unwrap_err();
        assert_eq!(err, OrderError::DiscountAlreadyApplied);
        assert_eq!(err.code(), "ORDER_002");
    }

    #[test]
    fn test_apply_discount_rejects_out_of_range_percentage() {
        let mut order = pending_order();
        for pct in [dec!(-0.01), dec!(1.5)] {
            let err = order.apply_discount(pct).unwrap_err();
            assert_eq!(err.code(), "ORDER_003");
        }
        assert!(order.discount_amount().is_none());
    }

    #[test]
    fn test_apply_discount_after_confirm_fails() {
        let mut order = order_in(OrderStatus::Confirmed);
        assert_eq!(order.apply_discount(dec!(0.1)).unwrap_err().code(), "ORDER_002");
    }

    #[test]
    fn test_happy_path_raises_expected_events() {
        let mut order = pending_order();
        order.confirm().unwrap();
        order.pay().unwrap();
        order.ship().unwrap();
        order.deliver().unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.is_terminal());
        let types: Vec<&str> = order.pending_events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["OrderCreated", "OrderConfirmed", "OrderPaid"]);
    }

    #[test]
    fn test_every_transition_pair() {
        use OrderAction::*;
        use OrderStatus::*;

        let expected = [
            (Pending, ApplyDiscount, Ok(Pending)),
            (Pending, Confirm, Ok(Confirmed)),
            (Pending, Pay, Err("ORDER_005")),
            (Pending, Ship, Err("ORDER_010")),
            (Pending, Deliver, Err("ORDER_007")),
            (Pending, Cancel, Ok(Cancelled)),
            (Confirmed, ApplyDiscount, Err("ORDER_002")),
            (Confirmed, Confirm, Err("ORDER_004")),
            (Confirmed, Pay, Ok(Paid)),
            (Confirmed, Ship, Err("ORDER_010")),
            (Confirmed, Deliver, Err("ORDER_007")),
            (Confirmed, Cancel, Ok(Cancelled)),
            (Paid, ApplyDiscount, Err("ORDER_002")),
            (Paid, Confirm, Err("ORDER_004")),
            (Paid, Pay, Err("ORDER_005")),
            (Paid, Ship, Ok(Shipped)),
            (Paid, Deliver, Err("ORDER_007")),
            (Paid, Cancel, Ok(Cancelled)),
            (Shipped, ApplyDiscount, Err("ORDER_002")),
            (Shipped, Confirm, Err("ORDER_004")),
            (Shipped, Pay, Err("ORDER_005")),
            (Shipped, Ship, Err("ORDER_010")),
            (Shipped, Deliver, Ok(Delivered)),
            (Shipped, Cancel, Err("ORDER_008")),
            (Delivered, ApplyDiscount, Err("ORDER_002")),
            (Delivered, Confirm, Err("ORDER_004")),
            (Delivered, Pay, Err("ORDER_005")),
            (Delivered, Ship, Err("ORDER_010")),
            (Delivered, Deliver, Err("ORDER_007")),
            (Delivered, Cancel, Err("ORDER_008")),
            (Cancelled, ApplyDiscount, Err("ORDER_002")),
            (Cancelled, Confirm, Err("ORDER_004")),
            (Cancelled, Pay, Err("ORDER_005")),
            (Cancelled, Ship, Err("ORDER_010")),
            (Cancelled, Deliver, Err("ORDER_007")),
            (Cancelled, Cancel, Err("ORDER_008")),
        ];

        for (from, action, outcome) in expected {
            let mut order = order_in(from);
            let result = perform(&mut order, action).map(|()| order.status());
            match (result, outcome) {
                (Ok(status), Ok(want)) => assert_eq!(status, want, "{from} / {action}"),
                (Err(err), Err(code)) => {
                    assert_eq!(err.code(), code, "{from} / {action}");
                    assert_eq!(order.status(), from, "failed {action} must not change state");
                    assert!(order.pending_events().is_empty());
                }
                (got, want) => panic!("{from} / {action}: got {got:?}, want {want:?}"),
            }
        }
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut order = order_in(OrderStatus::Paid);
        order.cancel("customer request").unwrap();

        match order.pending_events() {
            [OrderEvent::OrderCancelled(data)] => {
                assert_eq!(data.reason, "customer request");
                assert_eq!(data.order_id, order.id());
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_mutations_refresh_updated_at() {
        let mut order = pending_order();
        let created = order.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        order.confirm().unwrap();
        assert!(order.updated_at() > created);
        assert_eq!(order.created_at(), created);
    }

    #[test]
    fn test_mark_persisted_drains_events_and_bumps_version() {
        let mut order = pending_order();
        order.confirm().unwrap();

        let drained = order.mark_persisted();

        assert_eq!(drained.len(), 2);
        assert!(order.pending_events().is_empty());
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn test_reconstitute_raises_no_events() {
        let original = order_in(OrderStatus::Paid);
        let restored = Order::reconstitute(original.to_parts());

        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.status(), OrderStatus::Paid);
        assert_eq!(restored.version(), original.version());
        assert_eq!(restored.items(), original.items());
    }

    #[test]
    fn test_outbox_records_follow_pending_events() {
        let mut order = pending_order();
        order.confirm().unwrap();

        let records = order.outbox_records().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "OrderCreated");
        assert_eq!(records[1].event_type, "OrderConfirmed");
        assert_eq!(records[0].aggregate_type, "Order");
        assert_eq!(records[0].aggregate_id, order.id().to_string());
        assert_eq!(records[1].payload["type"], "OrderConfirmed");
        assert_eq!(records[0].created_at, order.pending_events()[0].occurred_at());
    }
}
