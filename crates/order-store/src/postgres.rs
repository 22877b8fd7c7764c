use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderId, OrderRecord, Result, StoreError, Version,
    store::{OrderStore, conflict_or_missing, validate_record_for_save},
};

const SELECT_COLUMNS: &str =
    "SELECT id, version, state, next_transition_at, created_at, updated_at, document FROM orders";

/// PostgreSQL-backed order store.
///
/// The compare-and-swap is a single conditional statement, so writers in
/// different processes (API replicas, the scheduler) race safely.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            state: row.try_get("state")?,
            next_transition_at: row.try_get("next_transition_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            document: row.try_get("document")?,
        })
    }

    async fn current_version(&self, order_id: OrderId) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(Version::new))
    }

    async fn insert(&self, record: &OrderRecord) -> Result<Version> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, version, state, next_transition_at, created_at, updated_at, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.order_id.as_uuid())
        .bind(record.version.as_i64())
        .bind(&record.state)
        .bind(record.next_transition_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(&record.document)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(record.version),
            Err(sqlx::Error::Database(ref db_err)) if db_err.constraint() == Some("orders_pkey") => {
                // Report what is stored now; it may have moved on or gone since.
                let actual = self
                    .current_version(record.order_id)
                    .await?
                    .unwrap_or(Version::first());
                Err(StoreError::VersionConflict {
                    order_id: record.order_id,
                    expected: Version::initial(),
                    actual,
                })
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn load(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn save_if_version_matches(
        &self,
        record: OrderRecord,
        expected: Version,
    ) -> Result<Version> {
        validate_record_for_save(&record, expected)?;

        if expected == Version::initial() {
            return self.insert(&record).await;
        }

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET version = $3, state = $4, next_transition_at = $5, updated_at = $6, document = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(record.order_id.as_uuid())
        .bind(expected.as_i64())
        .bind(record.version.as_i64())
        .bind(&record.state)
        .bind(record.next_transition_at)
        .bind(record.updated_at)
        .bind(&record.document)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            let actual = self.current_version(record.order_id).await?;
            tracing::debug!(order_id = %record.order_id, %expected, ?actual, "conditional update rejected");
            return Err(conflict_or_missing(record.order_id, expected, actual));
        }

        Ok(record.version)
    }

    async fn delete_if_version_matches(&self, order_id: OrderId, expected: Version) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1 AND version = $2")
            .bind(order_id.as_uuid())
            .bind(expected.as_i64())
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            let actual = self.current_version(order_id).await?;
            tracing::debug!(%order_id, %expected, ?actual, "conditional delete rejected");
            return Err(conflict_or_missing(order_id, expected, actual));
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE next_transition_at IS NOT NULL AND next_transition_at <= $1 \
             ORDER BY next_transition_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
