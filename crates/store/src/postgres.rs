//! PostgreSQL-backed store implementation.
//!
//! Aggregates are stored as JSONB documents alongside the columns the
//! queries filter on. Every update conditions on `WHERE id = $1 AND
//! version = $2`; zero affected rows means a stale version and the save
//! fails with `ConcurrencyConflict`. Outbox records are inserted inside the
//! same transaction as the aggregate row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EventId, Version};
use domain::{AggregateRoot, CustomerId, Order, Procurement, ProcurementStatus, SagaStatus};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::outbox_record::OutboxRecord;
use crate::query::ProcurementFilter;
use crate::traits::{OrderStore, OutboxStore, ProcurementStore};

/// PostgreSQL store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn insert_outbox(
        tx: &mut Transaction<'_, Postgres>,
        records: &[OutboxRecord],
    ) -> Result<()> {
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO outbox_records
                    (id, aggregate_id, event_type, payload, created_at, processed_at, processed, retry_count, last_error)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(record.aggregate_id.as_uuid())
            .bind(&record.event_type)
            .bind(&record.payload)
            .bind(record.created_at)
            .bind(record.processed_at)
            .bind(record.processed)
            .bind(record.retry_count as i32)
            .bind(&record.last_error)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }

    fn row_to_procurement(row: PgRow) -> Result<Procurement> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxRecord> {
        Ok(OutboxRecord {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
            processed: row.try_get("processed")?,
            retry_count: row.try_get::<i32, _>("retry_count")? as u32,
            last_error: row.try_get("last_error")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn save_order(&self, mut order: Order, outbox: Vec<OutboxRecord>) -> Result<Order> {
        let expected = order.version();
        order.set_version(expected.next());
        let doc = serde_json::to_value(&order)?;

        let mut tx = self.pool.begin().await?;

        if expected == Version::initial() {
            sqlx::query(
                r#"
                INSERT INTO orders (id, customer_id, saga_status, updated_at, version, doc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(order.customer_id().as_uuid())
            .bind(order.saga_status().as_str())
            .bind(order.updated_at())
            .bind(order.version().as_i64())
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::ConcurrencyConflict {
                        aggregate_type: Order::aggregate_type(),
                        id: order.id(),
                        expected,
                        actual: Version::new(1),
                    };
                }
                StoreError::Database(e)
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET saga_status = $3, updated_at = $4, version = $5, doc = $6
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(expected.as_i64())
            .bind(order.saga_status().as_str())
            .bind(order.updated_at())
            .bind(order.version().as_i64())
            .bind(&doc)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                        .bind(order.id().as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_type: Order::aggregate_type(),
                    id: order.id(),
                    expected,
                    actual: Version::new(actual.unwrap_or(0)),
                });
            }
        }

        Self::insert_outbox(&mut tx, &outbox).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: AggregateId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT doc FROM orders WHERE customer_id = $1 ORDER BY (doc->>'created_at') ASC",
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn stalled_orders(
        &self,
        statuses: &[SagaStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let status_names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(
            r#"
            SELECT doc FROM orders
            WHERE saga_status = ANY($1) AND updated_at < $2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(&status_names)
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl ProcurementStore for PostgresStore {
    async fn save_procurement(
        &self,
        mut procurement: Procurement,
        outbox: Vec<OutboxRecord>,
    ) -> Result<Procurement> {
        let expected = procurement.version();
        procurement.set_version(expected.next());
        let doc = serde_json::to_value(&procurement)?;

        let mut tx = self.pool.begin().await?;

        if expected == Version::initial() {
            sqlx::query(
                r#"
                INSERT INTO procurements (id, buyer_id, status, deadline, version, doc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(procurement.id().as_uuid())
            .bind(procurement.buyer_id().as_str())
            .bind(procurement.status().as_str())
            .bind(procurement.deadline())
            .bind(procurement.version().as_i64())
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::ConcurrencyConflict {
                        aggregate_type: Procurement::aggregate_type(),
                        id: procurement.id(),
                        expected,
                        actual: Version::new(1),
                    };
                }
                StoreError::Database(e)
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE procurements
                SET status = $3, deadline = $4, version = $5, doc = $6
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(procurement.id().as_uuid())
            .bind(expected.as_i64())
            .bind(procurement.status().as_str())
            .bind(procurement.deadline())
            .bind(procurement.version().as_i64())
            .bind(&doc)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM procurements WHERE id = $1")
                        .bind(procurement.id().as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_type: Procurement::aggregate_type(),
                    id: procurement.id(),
                    expected,
                    actual: Version::new(actual.unwrap_or(0)),
                });
            }
        }

        Self::insert_outbox(&mut tx, &outbox).await?;
        tx.commit().await?;
        Ok(procurement)
    }

    async fn get_procurement(&self, id: AggregateId) -> Result<Option<Procurement>> {
        let row = sqlx::query("SELECT doc FROM procurements WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_procurement).transpose()
    }

    async fn list_procurements(&self, filter: &ProcurementFilter) -> Result<Vec<Procurement>> {
        let mut sql = String::from("SELECT doc FROM procurements WHERE 1=1");
        let mut param_count = 0;

        if filter.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if filter.buyer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND buyer_id = ${param_count}"));
        }
        sql.push_str(" ORDER BY (doc->>'created_at') ASC");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(ref buyer_id) = filter.buyer_id {
            query = query.bind(buyer_id.as_str().to_string());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_procurement).collect()
    }

    async fn procurements_open_past_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Procurement>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM procurements
            WHERE status = $1 AND deadline < $2
            ORDER BY deadline ASC
            "#,
        )
        .bind(ProcurementStatus::BiddingOpen.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_procurement).collect()
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn append_outbox(&self, records: Vec<OutboxRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_outbox(&mut tx, &records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn pending_outbox(&self, max_retries: u32, limit: usize) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, event_type, payload, created_at, processed_at, processed, retry_count, last_error
            FROM outbox_records
            WHERE processed = FALSE AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_retries as i32)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox_records SET processed = TRUE, processed_at = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(processed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "OutboxRecord",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_failed(&self, id: EventId, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox_records SET retry_count = retry_count + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "OutboxRecord",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM outbox_records WHERE processed = TRUE AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }
}
