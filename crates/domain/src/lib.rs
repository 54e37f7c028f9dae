//! Domain layer for the order service.
//!
//! This crate provides:
//! - `AggregateRoot` and `DomainEvent` traits for snapshot-persisted aggregates
//! - the Order aggregate with its state machine, pricing rules and events
//! - `OrderRepository`, the storage port that writes state and outbox records together
//! - `OrderService`, which loads, mutates and saves orders per command

pub mod aggregate;
pub mod error;
pub mod order;
pub mod repository;

pub use aggregate::{AggregateRoot, DomainEvent};
pub use error::DomainError;
pub use order::{
    ApplyDiscount, CancelOrder, CommandResult, ConfirmOrder, CreateOrder, CustomerId,
    DeliverOrder, DiscountPolicy, Email, InMemoryOrderRepository, Money, MoneyError,
    NewOrderItem, Order, OrderAction, OrderError, OrderEvent, OrderEventKind, OrderItem,
    OrderParts, OrderService, OrderStatus, PayOrder, PriceRange, ProductId, ShipOrder,
};
pub use repository::OrderRepository;
