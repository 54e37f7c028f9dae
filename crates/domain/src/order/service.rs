//! Order service providing the command API for orders.

use common::AggregateId;
use metrics::counter;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::repository::OrderRepository;

use super::{
    ApplyDiscount, CancelOrder, ConfirmOrder, CreateOrder, DeliverOrder, DiscountPolicy, Order,
    OrderError, OrderEvent, PayOrder, ShipOrder,
};

/// Result of a successful command.
#[derive(Debug)]
pub struct CommandResult {
    /// The order as stored after the command.
    pub order: Order,

    /// The events that were written to the outbox by this command.
    pub events: Vec<OrderEvent>,
}

/// Service for managing orders.
///
/// Each command loads the order, applies one aggregate operation and saves
/// it, which writes the new state and its events to the outbox together.
/// A rejected command leaves storage untouched.
pub struct OrderService<R: OrderRepository> {
    repository: R,
    policy: DiscountPolicy,
}

impl<R: OrderRepository> OrderService<R> {
    /// Creates a service with the default discount policy.
    pub fn new(repository: R) -> Self {
        Self::with_policy(repository, DiscountPolicy::default())
    }

    pub fn with_policy(repository: R, policy: DiscountPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Creates and stores a new order.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<CommandResult, DomainError> {
        let result = self.create(cmd).await;
        record_outcome("create", &result);
        result
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm_order(&self, cmd: ConfirmOrder) -> Result<CommandResult, DomainError> {
        self.execute("confirm", cmd.order_id, Order::confirm).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn pay_order(&self, cmd: PayOrder) -> Result<CommandResult, DomainError> {
        self.execute("pay", cmd.order_id, Order::pay).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn ship_order(&self, cmd: ShipOrder) -> Result<CommandResult, DomainError> {
        self.execute("ship", cmd.order_id, Order::ship).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn deliver_order(&self, cmd: DeliverOrder) -> Result<CommandResult, DomainError> {
        self.execute("deliver", cmd.order_id, Order::deliver).await
    }

    /// Cancels an order that has not shipped yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<CommandResult, DomainError> {
        let reason = cmd.reason;
        self.execute("cancel", cmd.order_id, move |order| order.cancel(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn apply_discount(&self, cmd: ApplyDiscount) -> Result<CommandResult, DomainError> {
        let percentage = cmd.percentage;
        self.execute("apply_discount", cmd.order_id, move |order| {
            order.apply_discount(percentage)
        })
        .await
    }

    /// Gets the current state of an order.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        Ok(self.repository.find_by_id(order_id).await?)
    }

    /// Deletes an order. Returns whether it existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: AggregateId) -> Result<bool, DomainError> {
        Ok(self.repository.delete_by_id(order_id).await?)
    }

    async fn create(&self, cmd: CreateOrder) -> Result<CommandResult, DomainError> {
        let validated = cmd.validate()?;
        let mut order = Order::create_with_policy(
            validated.customer_id,
            validated.customer_email,
            validated.items,
            &self.policy,
        )?;
        let events = self.repository.save(&mut order).await?;

        tracing::info!(
            order_id = %order.id(),
            total = %order.total_amount(),
            final_amount = %order.final_amount(),
            "order created"
        );
        Ok(CommandResult { order, events })
    }

    async fn execute<F>(
        &self,
        command: &'static str,
        order_id: AggregateId,
        operation: F,
    ) -> Result<CommandResult, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
    {
        let result = self.apply(order_id, operation).await;
        if let Ok(applied) = &result {
            tracing::info!(
                %order_id,
                command,
                status = %applied.order.status(),
                events = applied.events.len(),
                "order updated"
            );
        }
        record_outcome(command, &result);
        result
    }

    async fn apply<F>(&self, order_id: AggregateId, operation: F) -> Result<CommandResult, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
    {
        let mut order = self
            .repository
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        operation(&mut order)?;
        let events = self.repository.save(&mut order).await?;
        Ok(CommandResult { order, events })
    }
}

fn record_outcome(command: &'static str, result: &Result<CommandResult, DomainError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(DomainError::Order(_)) => "rejected",
        Err(DomainError::Store(_)) => "error",
    };
    if let Err(err) = result {
        tracing::warn!(command, code = err.code(), error = %err, "order command failed");
    }
    counter!("orders_commands_total", "command" => command, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::order::{InMemoryOrderRepository, NewOrderItem, OrderStatus};

    fn service() -> OrderService<InMemoryOrderRepository> {
        OrderService::new(InMemoryOrderRepository::default())
    }

    fn create_cmd() -> CreateOrder {
        CreateOrder::new(
            "CUST-001",
            "buyer@example.com",
            vec![NewOrderItem::new("prod-1", "Widget", 2, dec!(100))],
        )
    }

    #[tokio::test]
    async fn create_order_saves_and_returns_events() {
        let service = service();
        let result = service.create_order(create_cmd()).await.unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.order.version(), 1);
        assert_eq!(service.repository().journal().len().await, 1);
    }

    #[tokio::test]
    async fn invalid_create_writes_nothing() {
        let service = service();
        let cmd = CreateOrder::new("CUST-001", "buyer@example.com", vec![]);

        let err = service.create_order(cmd).await.unwrap_err();

        assert_eq!(err.code(), "ORDER_001");
        assert!(service.repository().is_empty().await);
        assert!(service.repository().journal().is_empty().await);
    }

    #[tokio::test]
    async fn overflowing_price_is_rejected_not_panicking() {
        let service = service();
        let cmd = CreateOrder::new(
            "CUST-001",
            "buyer@example.com",
            vec![NewOrderItem::new("prod-1", "Widget", 2, rust_decimal::Decimal::MAX)],
        );

        let err = service.create_order(cmd).await.unwrap_err();

        assert_eq!(err.code(), "ORDER_009");
        assert!(service.repository().journal().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let err = service()
            .confirm_order(ConfirmOrder::new(AggregateId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ORDER_006");
    }

    #[tokio::test]
    async fn rejected_transition_leaves_stored_order() {
        let service = service();
        let id = service.create_order(create_cmd()).await.unwrap().order.id();

        let err = service.pay_order(PayOrder::new(id)).await.unwrap_err();

        assert_eq!(err.code(), "ORDER_005");
        let stored = service.get_order(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Pending);
        assert_eq!(stored.version(), 1);
    }

    #[tokio::test]
    async fn discount_without_event() {
        let service = service();
        let id = service.create_order(create_cmd()).await.unwrap().order.id();

        let result = service
            .apply_discount(ApplyDiscount::new(id, dec!(0.5)))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.order.final_amount().amount(), dec!(100));
        assert_eq!(service.repository().journal().len().await, 1);
    }
}
