use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AggregateRoot, ConfirmOrder, CreateOrder, CustomerId, Email, InMemoryOrderRepository, Money,
    NewOrderItem, Order, OrderItem, OrderService, PayOrder,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn create_cmd(items: u32) -> CreateOrder {
    CreateOrder::new(
        "CUST-BENCH",
        "bench@example.com",
        (1..=items)
            .map(|i| NewOrderItem::new(format!("SKU-{i:03}"), format!("Product {i}"), 1, dec!(5)))
            .collect(),
    )
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = OrderService::new(InMemoryOrderRepository::default());
                service.create_order(create_cmd(1)).await.unwrap();
            });
        });
    });
}

fn bench_full_command_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/full_create_confirm_pay", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = OrderService::new(InMemoryOrderRepository::default());
                let order_id = service.create_order(create_cmd(3)).await.unwrap().order.id();

                service
                    .confirm_order(ConfirmOrder::new(order_id))
                    .await
                    .unwrap();
                service.pay_order(PayOrder::new(order_id)).await.unwrap();
            });
        });
    });
}

fn bench_pricing_50_items(c: &mut Criterion) {
    let items: Vec<OrderItem> = (1..=50u32)
        .map(|i| {
            OrderItem::new(
                format!("SKU-{i:03}").as_str(),
                format!("Product {i}"),
                i % 3 + 1,
                Money::usd(Decimal::new(i64::from(i) * 199, 2)).unwrap(),
            )
            .unwrap()
        })
        .collect();
    let customer_id = CustomerId::new("CUST-BENCH").unwrap();
    let email = Email::parse("bench@example.com").unwrap();

    c.bench_function("domain/price_50_items", |b| {
        b.iter(|| {
            Order::create(customer_id.clone(), email.clone(), items.clone()).unwrap();
        });
    });
}

fn bench_outbox_records(c: &mut Criterion) {
    let mut order = Order::create(
        CustomerId::new("CUST-BENCH").unwrap(),
        Email::parse("bench@example.com").unwrap(),
        vec![OrderItem::new("SKU-001", "Widget", 2, Money::usd(dec!(100)).unwrap()).unwrap()],
    )
    .unwrap();
    order.confirm().unwrap();
    order.pay().unwrap();

    c.bench_function("domain/outbox_records_3_events", |b| {
        b.iter(|| order.outbox_records().unwrap());
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_full_command_cycle,
    bench_pricing_50_items,
    bench_outbox_records,
);
criterion_main!(benches);
