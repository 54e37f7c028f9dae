//! PostgreSQL storage for orders.
//!
//! [`PostgresOrderRepository`] keeps the current state of each order in the
//! `orders` and `order_items` tables and appends the order's pending events
//! to the `outbox` table inside the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    AggregateRoot, CustomerId, Email, Money, Order, OrderItem, OrderParts, OrderRepository,
    OrderStatus,
};
use outbox::{OutboxRecord, PostgresOutboxJournal, StoreError};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

type Result<T> = std::result::Result<T, StoreError>;

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, customer_email, status, currency,
                                total_amount, discount_amount, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_str())
        .bind(order.customer_email().as_str())
        .bind(order.status().as_str())
        .bind(order.total_amount().currency())
        .bind(order.total_amount().amount())
        .bind(order.discount_amount().map(Money::amount))
        .bind(order.version() + 1)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            // The primary key already exists: someone saved this order first.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return conflict(order, None);
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn update_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, customer_email = $3, total_amount = $4, discount_amount = $5,
                updated_at = $6, version = version + 1
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.customer_email().as_str())
        .bind(order.total_amount().amount())
        .bind(order.discount_amount().map(Money::amount))
        .bind(order.updated_at())
        .bind(order.version())
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                    .bind(order.id().as_uuid())
                    .fetch_optional(&mut **tx)
                    .await?;
            return Err(conflict(order, actual));
        }
        Ok(())
    }

    async fn replace_items(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id().as_uuid())
            .execute(&mut **tx)
            .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name,
                                         quantity, unit_price, currency)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(db_int("position", position)?)
            .bind(item.product_id().as_str())
            .bind(item.product_name())
            .bind(db_int("quantity", item.quantity())?)
            .bind(item.unit_price().amount())
            .bind(item.unit_price().currency())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| corrupt("order_items", format!("negative quantity {quantity}")))?;
        let currency: String = row.try_get("currency")?;
        let unit_price: Decimal = row.try_get("unit_price")?;
        let unit_price = Money::new(unit_price.normalize(), &currency)
            .map_err(|e| corrupt("order_items", e.to_string()))?;

        OrderItem::new(
            row.try_get::<String, _>("product_id")?,
            row.try_get::<String, _>("product_name")?,
            quantity,
            unit_price,
        )
        .map_err(|e| corrupt("order_items", e.to_string()))
    }

    fn row_to_parts(row: PgRow, items: Vec<OrderItem>) -> Result<OrderParts> {
        let currency: String = row.try_get("currency")?;
        let money = |amount: Decimal| {
            Money::new(amount.normalize(), &currency)
                .map_err(|e| corrupt("orders", e.to_string()))
        };

        let status: String = row.try_get("status")?;
        let discount_amount: Option<Decimal> = row.try_get("discount_amount")?;

        Ok(OrderParts {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?)
                .map_err(|e| corrupt("orders", e.to_string()))?,
            customer_email: Email::parse(row.try_get::<String, _>("customer_email")?)
                .map_err(|e| corrupt("orders", e.to_string()))?,
            items,
            status: status
                .parse::<OrderStatus>()
                .map_err(|reason| corrupt("orders", reason))?,
            total_amount: money(row.try_get("total_amount")?)?,
            discount_amount: discount_amount.map(money).transpose()?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn persist(&self, order: &Order) -> Result<Vec<OutboxRecord>> {
        let records = order.outbox_records()?;
        let mut tx = self.pool.begin().await?;

        if order.version() == 0 {
            Self::insert_order(&mut tx, order).await?;
        } else {
            Self::update_order(&mut tx, order).await?;
        }
        Self::replace_items(&mut tx, order).await?;
        let appended = PostgresOutboxJournal::append_in_tx(&mut tx, records).await?;

        tx.commit().await?;

        tracing::debug!(
            order_id = %order.id(),
            version = order.version() + 1,
            outbox_records = appended.len(),
            "order row written"
        );
        Ok(appended)
    }

    async fn find_by_id(&self, id: AggregateId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, customer_email, status, currency, total_amount,
                   discount_amount, version, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price, currency
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Self::row_to_item)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order::reconstitute(Self::row_to_parts(row, items)?)))
    }

    async fn delete_by_id(&self, id: AggregateId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}

fn conflict(order: &Order, actual: Option<i64>) -> StoreError {
    StoreError::ConcurrencyConflict {
        aggregate_type: Order::aggregate_type(),
        aggregate_id: order.id().to_string(),
        expected: order.version(),
        actual,
    }
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> StoreError {
    StoreError::CorruptRow {
        table,
        reason: reason.into(),
    }
}

fn db_int<T>(column: &'static str, value: T) -> Result<i32>
where
    T: Copy + ToString + TryInto<i32>,
{
    value
        .try_into()
        .map_err(|_| StoreError::Unrepresentable {
            table: "order_items",
            column,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_int_refuses_to_saturate() {
        assert_eq!(db_int("quantity", 42u32).unwrap(), 42);
        assert_eq!(db_int("quantity", i32::MAX as u32).unwrap(), i32::MAX);

        let err = db_int("quantity", 3_000_000_000u32).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unrepresentable {
                column: "quantity",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Value does not fit order_items.quantity: 3000000000"
        );
    }
}
