use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::{NewOutboxRecord, OutboxJournal, OutboxRecord, PendingQuery, Result, StoreError};

const RECORD_COLUMNS: &str = "id, aggregate_type, aggregate_id, event_type, payload, created_at, \
     processed, processed_at, attempts, last_error";

/// PostgreSQL-backed outbox journal.
#[derive(Clone)]
pub struct PostgresOutboxJournal {
    pool: PgPool,
}

impl PostgresOutboxJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the workspace migrations (orders, order items and outbox tables).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Appends records inside the caller's transaction.
    ///
    /// Nothing becomes visible to pollers until the caller commits, which
    /// is how the journal stays consistent with the aggregate rows written
    /// in the same transaction.
    pub async fn append_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        records: Vec<NewOutboxRecord>,
    ) -> Result<Vec<OutboxRecord>> {
        let sql = format!(
            "INSERT INTO outbox (aggregate_type, aggregate_id, event_type, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RECORD_COLUMNS}"
        );

        let mut appended = Vec::with_capacity(records.len());
        for record in records {
            let row: OutboxRecord = sqlx::query_as(&sql)
                .bind(&record.aggregate_type)
                .bind(&record.aggregate_id)
                .bind(&record.event_type)
                .bind(&record.payload)
                .bind(record.created_at)
                .fetch_one(&mut **tx)
                .await?;
            appended.push(row);
        }

        metrics::counter!("outbox_records_journaled_total").increment(appended.len() as u64);
        Ok(appended)
    }
}

#[async_trait]
impl OutboxJournal for PostgresOutboxJournal {
    async fn fetch_unprocessed(&self, query: PendingQuery) -> Result<Vec<OutboxRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM outbox \
             WHERE processed = FALSE AND ($1::INT IS NULL OR attempts < $1) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2"
        );

        let max_attempts = query
            .max_attempts
            .map(|max| i32::try_from(max).unwrap_or(i32::MAX));
        let limit = query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let records = sqlx::query_as::<_, OutboxRecord>(&sql)
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET processed = TRUE, processed_at = NOW()
            WHERE id = $1 AND processed = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<i32> {
        let attempts: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE outbox
            SET attempts = attempts + 1, last_error = $2
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        attempts.ok_or_else(|| StoreError::Unavailable(format!("outbox record {id} not found")))
    }

    async fn pending_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE processed = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM outbox WHERE processed = TRUE AND created_at < $1")
                .bind(older_than)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
