//! `PostgreSQL` implementation of [`CounterStore`].
//!
//! Counters live in the `order_counters` table, one row per month:
//!
//! | column | type | notes |
//! |---|---|---|
//! | `month_key` | `TEXT` | primary key, `YYYYMM` |
//! | `count` | `JSONB` | nullable; a non-numeric value is a corrupt record |
//! | `last_updated` | `TIMESTAMPTZ` | nullable |
//! | `initialized` | `BOOLEAN` | set by administrative pre-seeding |

use chrono::{DateTime, Utc};
use order_sequence_core::counter::{CounterRecord, CounterWrite, RecordCount};
use order_sequence_core::counter_store::{
    CounterStore, CounterStoreError, CounterTransaction, StoreFuture,
};
use order_sequence_core::month::MonthKey;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLSTATEs that mean "lost a race": serialization failure, deadlock and
/// unique violation on the month key.
const CONTENTION_CODES: [&str; 3] = ["40001", "40P01", "23505"];

const SELECT_FOR_UPDATE: &str = r"
    SELECT count, last_updated, initialized
    FROM order_counters
    WHERE month_key = $1
    FOR UPDATE
";

const SELECT_ONE: &str = r"
    SELECT count, last_updated, initialized
    FROM order_counters
    WHERE month_key = $1
";

const INSERT_NEW: &str = r"
    INSERT INTO order_counters (month_key, count, last_updated, initialized)
    VALUES ($1, $2, $3, FALSE)
";

const UPDATE_EXISTING: &str = r"
    UPDATE order_counters
    SET count = $2, last_updated = $3
    WHERE month_key = $1
";

const UPSERT: &str = r"
    INSERT INTO order_counters (month_key, count, last_updated, initialized)
    VALUES ($1, $2, $3, FALSE)
    ON CONFLICT (month_key) DO UPDATE
    SET count = EXCLUDED.count, last_updated = EXCLUDED.last_updated
";

fn transaction_error(month_key: MonthKey, error: &sqlx::Error) -> CounterStoreError {
    match error {
        sqlx::Error::Database(db)
            if db.code().is_some_and(|code| CONTENTION_CODES.contains(&&*code)) =>
        {
            CounterStoreError::Contention { month_key }
        }
        _ => CounterStoreError::Unavailable(error.to_string()),
    }
}

fn unavailable(error: &sqlx::Error) -> CounterStoreError {
    CounterStoreError::Unavailable(error.to_string())
}

fn record_from_row(month_key: MonthKey, row: &PgRow) -> Result<CounterRecord, sqlx::Error> {
    let count: Option<serde_json::Value> = row.try_get("count")?;
    Ok(CounterRecord {
        month_key,
        count: RecordCount::from_json(count.as_ref()),
        last_updated: row.try_get::<Option<DateTime<Utc>>, _>("last_updated")?,
        initialized: row.try_get("initialized")?,
    })
}

/// `PostgreSQL`-backed counter store.
///
/// Increments lock the month's row with `SELECT ... FOR UPDATE`, so concurrent
/// increments of the same month queue up instead of conflicting. The only race
/// left is two transactions creating the first row of a month; the loser hits
/// the primary key and reports [`CounterStoreError::Contention`].
///
/// Cloning shares the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    /// Connect with [`DEFAULT_MAX_CONNECTIONS`] pooled connections.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Unavailable`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, CounterStoreError> {
        Self::connect(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with a pool of at most `max_connections` connections.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Unavailable`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, CounterStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CounterStoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to counter database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations, creating `order_counters` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Unavailable`] if migration fails.
    pub async fn migrate(&self) -> Result<(), CounterStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CounterStoreError::Unavailable(format!("Migration failed: {e}")))?;
        tracing::info!("Counter migrations applied");
        Ok(())
    }

    /// Close every pooled connection. Called once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

struct PostgresTransaction {
    month_key: MonthKey,
    tx: Transaction<'static, Postgres>,
    /// Whether `read` found a row, deciding between UPDATE and INSERT.
    exists: bool,
    pending: Option<CounterWrite>,
}

impl CounterTransaction for PostgresTransaction {
    fn read(&mut self) -> StoreFuture<'_, Option<CounterRecord>> {
        Box::pin(async move {
            let month_key = self.month_key;
            let row = sqlx::query(SELECT_FOR_UPDATE)
                .bind(month_key.to_string())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| transaction_error(month_key, &e))?;

            self.exists = row.is_some();
            row.map(|row| record_from_row(month_key, &row))
                .transpose()
                .map_err(|e| transaction_error(month_key, &e))
        })
    }

    fn write(&mut self, write: CounterWrite) {
        self.pending = Some(write);
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let Self {
                month_key,
                mut tx,
                exists,
                pending,
            } = *self;

            if let Some(write) = pending {
                let statement = if exists { UPDATE_EXISTING } else { INSERT_NEW };
                sqlx::query(statement)
                    .bind(month_key.to_string())
                    .bind(serde_json::Value::from(write.count))
                    .bind(write.last_updated)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| transaction_error(month_key, &e))?;
            }

            tx.commit()
                .await
                .map_err(|e| transaction_error(month_key, &e))
        })
    }
}

impl CounterStore for PostgresCounterStore {
    fn begin(&self, month_key: MonthKey) -> StoreFuture<'_, Box<dyn CounterTransaction>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| transaction_error(month_key, &e))?;

            let tx: Box<dyn CounterTransaction> = Box::new(PostgresTransaction {
                month_key,
                tx,
                exists: false,
                pending: None,
            });
            Ok(tx)
        })
    }

    fn load(&self, month_key: MonthKey) -> StoreFuture<'_, Option<CounterRecord>> {
        Box::pin(async move {
            let row = sqlx::query(SELECT_ONE)
                .bind(month_key.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| unavailable(&e))?;

            row.map(|row| record_from_row(month_key, &row))
                .transpose()
                .map_err(|e| unavailable(&e))
        })
    }

    fn store(&self, month_key: MonthKey, write: CounterWrite) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(UPSERT)
                .bind(month_key.to_string())
                .bind(serde_json::Value::from(write.count))
                .bind(write.last_updated)
                .execute(&self.pool)
                .await
                .map_err(|e| unavailable(&e))?;
            Ok(())
        })
    }

    fn create_if_absent(&self, record: CounterRecord) -> StoreFuture<'_, CounterRecord> {
        Box::pin(async move {
            let month_key = record.month_key;
            let inserted = sqlx::query(
                r"
                INSERT INTO order_counters (month_key, count, last_updated, initialized)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (month_key) DO NOTHING
                RETURNING count, last_updated, initialized
                ",
            )
            .bind(month_key.to_string())
            .bind(record.count.to_json())
            .bind(record.last_updated)
            .bind(record.initialized)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable(&e))?;

            // Return what was stored, not `record`: TIMESTAMPTZ keeps only
            // microseconds, and repeated calls must yield equal records.
            if let Some(row) = inserted {
                tracing::debug!(%month_key, "Counter row created");
                return record_from_row(month_key, &row).map_err(|e| unavailable(&e));
            }

            // Rows are never deleted, so the conflicting row is still there.
            let row = sqlx::query(SELECT_ONE)
                .bind(month_key.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| unavailable(&e))?;
            record_from_row(month_key, &row).map_err(|e| unavailable(&e))
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<CounterRecord>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT month_key, count, last_updated, initialized
                FROM order_counters
                ORDER BY month_key ASC
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable(&e))?;

            let mut records = Vec::with_capacity(rows.len());
            for row in &rows {
                let raw_key: String = row.try_get("month_key").map_err(|e| unavailable(&e))?;
                match raw_key.parse::<MonthKey>() {
                    Ok(month_key) => {
                        records.push(record_from_row(month_key, row).map_err(|e| unavailable(&e))?);
                    }
                    Err(error) => {
                        tracing::warn!(month_key = %raw_key, %error, "Skipping counter row with invalid month key");
                    }
                }
            }
            Ok(records)
        })
    }
}
