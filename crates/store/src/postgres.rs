use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, SagaId, UserId};
use domain::{
    IdempotencyRecord, Money, Order, OrderLine, OrderSaga, OutboxEntry, ProductId, SagaState,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{Store, UnitOfWork};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let status = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let payment_id = row
            .try_get::<Option<String>, _>("payment_id")?
            .map(PaymentId::new);

        Ok(Order::from_parts(
            OrderId::from(row.try_get::<String, _>("order_id")?),
            UserId::new(row.try_get::<String, _>("user_id")?),
            status,
            Money::from_cents(row.try_get("total_amount")?),
            payment_id,
            row.try_get("shipping_address")?,
            lines,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
            row.try_get("version")?,
        ))
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine::new(
            ProductId::new(row.try_get::<String, _>("product_id")?),
            row.try_get::<String, _>("product_name")?,
            row.try_get::<i32, _>("quantity")? as u32,
            Money::from_cents(row.try_get("unit_price")?),
        ))
    }

    fn row_to_saga(row: &PgRow) -> Result<OrderSaga> {
        let state: SagaState = row
            .try_get::<String, _>("state")?
            .parse()
            .map_err(StoreError::Corrupt)?;

        Ok(OrderSaga::from_parts(
            SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            OrderId::from(row.try_get::<String, _>("order_id")?),
            state,
            row.try_get("payload")?,
            row.try_get("created_at")?,
            row.try_get("last_updated")?,
        ))
    }

    fn row_to_entry(row: &PgRow) -> Result<OutboxEntry> {
        Ok(OutboxEntry {
            id: row.try_get("id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            published: row.try_get("published")?,
            published_at: row.try_get("published_at")?,
        })
    }

    async fn lines_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            "SELECT product_id, product_name, quantity, unit_price
             FROM order_lines WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_line).collect()
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, status, total_amount, payment_id,
                                shipping_address, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.order_id().as_str())
        .bind(order.user_id().as_str())
        .bind(order.status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.payment_id().map(|p| p.as_str()))
        .bind(order.shipping_address())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(order.version())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order.order_id().clone());
            }
            StoreError::Database(e)
        })?;

        for line in order.lines() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.order_id().as_str())
            .bind(line.product_id.as_str())
            .bind(&line.product_name)
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Compare-and-increment update. Lines are immutable after creation
    /// and are not rewritten.
    async fn update_order(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
        expected_version: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_id = $3, updated_at = $4, version = $5
            WHERE order_id = $1 AND version = $6
            "#,
        )
        .bind(order.order_id().as_str())
        .bind(order.status().as_str())
        .bind(order.payment_id().map(|p| p.as_str()))
        .bind(order.updated_at())
        .bind(expected_version + 1)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE order_id = $1")
                    .bind(order.order_id().as_str())
                    .fetch_optional(&mut **tx)
                    .await?;
            return match actual {
                Some(actual) => Err(StoreError::VersionConflict {
                    order_id: order.order_id().clone(),
                    expected: expected_version,
                    actual,
                }),
                None => Err(StoreError::OrderNotFound(order.order_id().clone())),
            };
        }
        Ok(())
    }

    async fn insert_saga(tx: &mut Transaction<'_, Postgres>, saga: &OrderSaga) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_sagas (saga_id, order_id, state, payload, created_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(saga.saga_id().as_uuid())
        .bind(saga.order_id().as_str())
        .bind(saga.state().as_str())
        .bind(saga.payload())
        .bind(saga.created_at())
        .bind(saga.last_updated())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("order_sagas_pkey")
            {
                return StoreError::DuplicateSaga(*saga.saga_id());
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    /// Compare-and-set update guarded by the state the caller observed.
    async fn update_saga(
        tx: &mut Transaction<'_, Postgres>,
        saga: &OrderSaga,
        observed_state: SagaState,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE order_sagas
            SET state = $2, payload = $3, last_updated = $4
            WHERE saga_id = $1 AND state = $5
            "#,
        )
        .bind(saga.saga_id().as_uuid())
        .bind(saga.state().as_str())
        .bind(saga.payload())
        .bind(saga.last_updated())
        .bind(observed_state.as_str())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT state FROM order_sagas WHERE saga_id = $1")
                    .bind(saga.saga_id().as_uuid())
                    .fetch_optional(&mut **tx)
                    .await?;
            return match actual {
                Some(actual) => Err(StoreError::SagaStateConflict {
                    saga_id: *saga.saga_id(),
                    expected: observed_state,
                    actual: actual.parse().map_err(StoreError::Corrupt)?,
                }),
                None => Err(StoreError::SagaNotFound(*saga.saga_id())),
            };
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for order in &work.order_inserts {
            Self::insert_order(&mut tx, order).await?;
        }
        for (order, expected_version) in &work.order_updates {
            Self::update_order(&mut tx, order, *expected_version).await?;
        }
        for saga in &work.saga_inserts {
            Self::insert_saga(&mut tx, saga).await?;
        }
        for (saga, observed_state) in &work.saga_updates {
            Self::update_saga(&mut tx, saga, *observed_state).await?;
        }
        for entry in &work.outbox_entries {
            sqlx::query(
                r#"
                INSERT INTO outbox_entries (aggregate_type, aggregate_id, event_type, payload, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&entry.aggregate_type)
            .bind(&entry.aggregate_id)
            .bind(&entry.event_type)
            .bind(&entry.payload)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = $1")
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let lines = self.lines_for_order(order_id).await?;
                Ok(Some(Self::row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn get_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, order_id",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_id = OrderId::from(row.try_get::<String, _>("order_id")?);
            let lines = self.lines_for_order(&order_id).await?;
            orders.push(Self::row_to_order(row, lines)?);
        }
        Ok(orders)
    }

    async fn order_exists(&self, order_id: &OrderId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(order_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_saga(&self, saga_id: &SagaId) -> Result<Option<OrderSaga>> {
        let row = sqlx::query("SELECT * FROM order_sagas WHERE saga_id = $1")
            .bind(saga_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_saga).transpose()
    }

    async fn find_stalled_sagas(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderSaga>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM order_sagas
            WHERE last_updated < $1
              AND state NOT IN ('Completed', 'Compensated', 'Failed')
            ORDER BY last_updated
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_saga).collect()
    }

    async fn unpublished_entries(&self) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM outbox_entries WHERE NOT published ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn mark_published(&self, entry_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE outbox_entries SET published = TRUE, published_at = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_published_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM outbox_entries WHERE published AND published_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn get_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query("SELECT * FROM idempotency_records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(IdempotencyRecord {
                key: row.try_get("key")?,
                response_payload: row.try_get("response_payload")?,
                created_at: row.try_get("created_at")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_records (key, response_payload, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.key)
        .bind(&record.response_payload)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("idempotency_records_pkey")
            {
                return StoreError::DuplicateIdempotencyKey(record.key.clone());
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }
}
