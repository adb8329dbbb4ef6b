//! Counter store trait and related types.
//!
//! This module defines the storage abstraction behind the sequence generator:
//! a transactional key-value store holding one [`CounterRecord`] per month.
//!
//! # Design
//!
//! The store offers two kinds of access:
//!
//! - **Transactions** ([`CounterStore::begin`]) scoped to a single month key.
//!   A transaction reads the record, buffers one [`CounterWrite`] and commits.
//!   If two transactions read the same prior state, at most one commits; the
//!   other fails with [`CounterStoreError::Contention`].
//! - **Plain operations** ([`CounterStore::load`], [`CounterStore::store`]) with
//!   no isolation at all. They exist for the degraded fallback path only.
//!
//! Administrative operations ([`CounterStore::create_if_absent`],
//! [`CounterStore::list`]) round it out.
//!
//! # Implementations
//!
//! - `PostgresCounterStore` (in `order-sequence-postgres`): Production implementation
//! - `InMemoryCounterStore` (in `order-sequence-testing`): Fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use order_sequence_core::counter::CounterWrite;
//! use order_sequence_core::counter_store::{CounterStore, CounterStoreError};
//! use order_sequence_core::month::MonthKey;
//! use chrono::Utc;
//!
//! async fn bump<S: CounterStore>(store: &S, month_key: MonthKey) -> Result<u64, CounterStoreError> {
//!     let mut tx = store.begin(month_key).await?;
//!     let next = match tx.read().await? {
//!         Some(record) => record.last_issued()? + 1,
//!         None => 1,
//!     };
//!     tx.write(CounterWrite { count: next, last_updated: Utc::now() });
//!     tx.commit().await?;
//!     Ok(next)
//! }
//! ```

use crate::counter::{CounterRecord, CounterWrite};
use crate::month::MonthKey;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CounterStoreError>> + Send + 'a>>;

/// Errors that can occur during counter store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterStoreError {
    /// The transaction lost a race with another increment of the same month.
    ///
    /// Nothing was written. Retryable.
    #[error("Contention on counter {month_key}: transaction aborted")]
    Contention {
        /// The month whose counter was contended.
        month_key: MonthKey,
    },

    /// The backend could not be reached or failed the operation.
    ///
    /// Retryable through the fallback path.
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// A record exists but its `count` field is not a non-negative integer.
    ///
    /// Recovered locally by treating the count as `0`; never surfaced to the
    /// order-creation flow.
    #[error("Corrupt counter record {month_key}: count field is {raw}")]
    CorruptRecord {
        /// The month whose record is corrupt.
        month_key: MonthKey,
        /// The raw JSON found in the `count` field.
        raw: String,
    },

    /// The counter is at the largest representable value and cannot advance.
    #[error("Counter {month_key} cannot advance past {count}")]
    Exhausted {
        /// The month whose counter is exhausted.
        month_key: MonthKey,
        /// The count that could not be incremented.
        count: u64,
    },
}

impl CounterStoreError {
    /// Whether the failure is transient and the caller may try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Unavailable(_))
    }

    /// Whether the failure is a lost transaction race.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// Stable, low-cardinality label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Contention { .. } => "contention",
            Self::Unavailable(_) => "unavailable",
            Self::CorruptRecord { .. } => "corrupt_record",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

/// A transaction scoped to a single month key.
///
/// Dropping a transaction without calling [`CounterTransaction::commit`]
/// discards the buffered write.
pub trait CounterTransaction: Send {
    /// Read the record inside the transaction.
    ///
    /// Returns `None` if no record exists for the month yet.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend failed the read
    /// - `Contention`: the backend already knows this transaction cannot commit
    fn read(&mut self) -> StoreFuture<'_, Option<CounterRecord>>;

    /// Buffer the write to apply on commit. A second call replaces the first.
    fn write(&mut self, write: CounterWrite);

    /// Commit the buffered write.
    ///
    /// # Errors
    ///
    /// - `Contention`: another transaction committed a change to the record
    ///   after this one read it; nothing was written
    /// - `Unavailable`: the backend failed the commit
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}

/// Counter store abstraction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one handle is opened at process
/// start and shared (`Arc<dyn CounterStore>`) by every request.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures instead of using `async fn` so the store can be
/// used as a trait object.
pub trait CounterStore: Send + Sync {
    /// Open a transaction scoped to `month_key`.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend could not start a transaction
    fn begin(&self, month_key: MonthKey) -> StoreFuture<'_, Box<dyn CounterTransaction>>;

    /// Plain read with no isolation.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend failed the read
    fn load(&self, month_key: MonthKey) -> StoreFuture<'_, Option<CounterRecord>>;

    /// Plain write with no isolation: sets `count` and `last_updated`, creating
    /// the record if needed.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend failed the write
    fn store(&self, month_key: MonthKey, write: CounterWrite) -> StoreFuture<'_, ()>;

    /// Insert `record` unless a record for its month already exists.
    ///
    /// Returns the record now stored: the existing one, unchanged, or `record`.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend failed the operation
    fn create_if_absent(&self, record: CounterRecord) -> StoreFuture<'_, CounterRecord>;

    /// All records, ordered by month key.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the backend failed the query
    fn list(&self) -> StoreFuture<'_, Vec<CounterRecord>>;
}
