//! The monthly order-number generator.
//!
//! # Numbering chain
//!
//! [`OrderNumberGenerator::next_order_number`] walks a fixed chain and never
//! fails:
//!
//! 1. **Transactional increment** ([`OrderNumberGenerator::increment_and_get`]):
//!    a single-key transaction reads the month's count, writes `count + 1` and
//!    commits. Lost races are retried within a small budget.
//! 2. **Non-atomic fallback**
//!    ([`OrderNumberGenerator::increment_and_get_non_atomic`]): plain read,
//!    plain write. Two concurrent callers can read the same count and issue the
//!    same number. This trades uniqueness for availability and is only entered
//!    after step 1 failed.
//! 3. **Emergency identifier** ([`OrderNumberGenerator::emergency_number`]):
//!    prefix plus Unix milliseconds, when the store is unreachable altogether.
//!
//! Each step down the chain is logged and counted.
//!
//! # Issued numbers are final
//!
//! Once a transaction commits, its number is issued, even if the caller is
//! cancelled or fails to persist its order afterwards. The counter is never
//! decremented, so issued numbers are unique and increasing but the set of
//! numbers on persisted orders may have gaps.
//!
//! No count is cached between calls; every increment goes to the store.

use crate::config::SequenceConfig;
use crate::metrics::SequenceMetrics;
use crate::resolver::MonthKeyResolver;
use crate::retry::{RetryPolicy, retry_with_predicate};
use order_sequence_core::counter::{CounterRecord, CounterWrite};
use order_sequence_core::counter_store::{CounterStore, CounterStoreError};
use order_sequence_core::environment::Clock;
use order_sequence_core::month::MonthKey;
use order_sequence_core::order_number::{NumberingMode, OrderNumber};
use std::sync::Arc;
use std::time::Instant;

/// Next sequence number after `record`.
///
/// No record, or a record without a usable count, yields `1`. A corrupt count
/// is logged and recovered as zero.
///
/// # Errors
///
/// Returns [`CounterStoreError::Exhausted`] if the count cannot be incremented.
fn next_sequence(month_key: MonthKey, record: Option<&CounterRecord>) -> Result<u64, CounterStoreError> {
    let last = match record.map(CounterRecord::last_issued) {
        None => 0,
        Some(Ok(count)) => count,
        Some(Err(error)) => {
            tracing::warn!(%month_key, %error, "Corrupt counter record, treating count as 0");
            SequenceMetrics::record_corrupt_record();
            0
        }
    };
    last.checked_add(1)
        .ok_or(CounterStoreError::Exhausted { month_key, count: last })
}

/// Issues `YYYYMM##` order numbers from a shared counter store.
///
/// Cheap to clone; clones share the store handle.
///
/// # Example
///
/// ```
/// use order_sequence_runtime::generator::OrderNumberGenerator;
/// use order_sequence_runtime::config::SequenceConfig;
/// use order_sequence_testing::mocks::{InMemoryCounterStore, test_clock};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let generator = OrderNumberGenerator::from_config(
///     Arc::new(InMemoryCounterStore::new()),
///     Arc::new(test_clock()),
///     &SequenceConfig::default(),
/// );
///
/// assert_eq!(generator.next_order_number().await.as_str(), "20250801");
/// assert_eq!(generator.next_order_number().await.as_str(), "20250802");
/// # });
/// ```
#[derive(Clone)]
pub struct OrderNumberGenerator {
    store: Arc<dyn CounterStore>,
    resolver: MonthKeyResolver,
    retry: RetryPolicy,
    emergency_prefix: String,
}

impl OrderNumberGenerator {
    /// Create a generator with the default retry budget and emergency prefix.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, resolver: MonthKeyResolver) -> Self {
        let defaults = SequenceConfig::default();
        Self {
            store,
            resolver,
            retry: defaults.transaction_retry,
            emergency_prefix: defaults.emergency_prefix,
        }
    }

    /// Create a generator from loaded configuration.
    #[must_use]
    pub fn from_config(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        config: &SequenceConfig,
    ) -> Self {
        Self {
            store,
            resolver: MonthKeyResolver::new(config.time_zone, clock),
            retry: config.transaction_retry.clone(),
            emergency_prefix: config.emergency_prefix.clone(),
        }
    }

    /// Replace the retry budget for contended transactions.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The resolver used for "now".
    #[must_use]
    pub const fn resolver(&self) -> &MonthKeyResolver {
        &self.resolver
    }

    /// Issue the order number for a new order created now.
    ///
    /// Never fails: when the transactional path fails the non-atomic fallback
    /// is used, and when that fails too an emergency identifier is returned.
    /// Check [`OrderNumber::mode`] to tell them apart.
    pub async fn next_order_number(&self) -> OrderNumber {
        let month_key = self.resolver.current_month_key();

        let reason = match self.increment_and_get(month_key).await {
            Ok(sequence) => {
                return self.issue(month_key, sequence, NumberingMode::Transactional);
            }
            Err(error) => error,
        };

        tracing::warn!(
            %month_key,
            error = %reason,
            "Transactional increment failed, using non-atomic fallback; order numbers may repeat"
        );
        SequenceMetrics::record_fallback(&reason);

        match self.increment_and_get_non_atomic(month_key).await {
            Ok(sequence) => self.issue(month_key, sequence, NumberingMode::NonAtomic),
            Err(error) => {
                let number = self.emergency_number();
                tracing::error!(
                    %month_key,
                    %error,
                    order_number = %number,
                    "Non-atomic increment failed, issued emergency order identifier"
                );
                SequenceMetrics::record_emergency();
                SequenceMetrics::record_issued(NumberingMode::Emergency);
                number
            }
        }
    }

    /// Atomically advance the counter for `month_key` and return the new value.
    ///
    /// Transactions that lose a race are retried within the retry budget.
    ///
    /// # Errors
    ///
    /// - `Contention`: every attempt lost a race
    /// - `Unavailable`: the store failed; not retried here
    /// - `Exhausted`: the count cannot advance
    pub async fn increment_and_get(&self, month_key: MonthKey) -> Result<u64, CounterStoreError> {
        retry_with_predicate(
            &self.retry,
            || self.try_increment(month_key),
            CounterStoreError::is_contention,
        )
        .await
    }

    /// One transactional attempt.
    async fn try_increment(&self, month_key: MonthKey) -> Result<u64, CounterStoreError> {
        let started = Instant::now();
        let result = self.transact(month_key).await;
        SequenceMetrics::record_transaction(started.elapsed(), result.as_ref().map(|_| ()));
        if let Err(error) = &result {
            tracing::debug!(%month_key, %error, "Counter transaction failed");
        }
        result
    }

    async fn transact(&self, month_key: MonthKey) -> Result<u64, CounterStoreError> {
        let mut tx = self.store.begin(month_key).await?;
        let record = tx.read().await?;
        let next = next_sequence(month_key, record.as_ref())?;
        tx.write(CounterWrite {
            count: next,
            last_updated: self.resolver.clock().now(),
        });
        tx.commit().await?;
        Ok(next)
    }

    /// Advance the counter with a plain read followed by a plain write.
    ///
    /// Not atomic: concurrent callers can read the same count and return the
    /// same value. Only meant for use after [`Self::increment_and_get`] failed.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the read or the write failed
    /// - `Exhausted`: the count cannot advance
    pub async fn increment_and_get_non_atomic(
        &self,
        month_key: MonthKey,
    ) -> Result<u64, CounterStoreError> {
        let record = self.store.load(month_key).await?;
        let next = next_sequence(month_key, record.as_ref())?;
        self.store
            .store(
                month_key,
                CounterWrite {
                    count: next,
                    last_updated: self.resolver.clock().now(),
                },
            )
            .await?;
        Ok(next)
    }

    /// Emergency identifier for "now": the configured prefix followed by Unix
    /// milliseconds. Opaque; unique only to millisecond resolution.
    #[must_use]
    pub fn emergency_number(&self) -> OrderNumber {
        OrderNumber::emergency(&self.emergency_prefix, self.resolver.clock().now())
    }

    fn issue(&self, month_key: MonthKey, sequence: u64, mode: NumberingMode) -> OrderNumber {
        let number = OrderNumber::sequenced(&month_key, sequence, mode);
        tracing::debug!(%month_key, sequence, %mode, order_number = %number, "Order number issued");
        SequenceMetrics::record_issued(mode);
        number
    }
}

impl std::fmt::Debug for OrderNumberGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderNumberGenerator")
            .field("resolver", &self.resolver)
            .field("retry", &self.retry)
            .field("emergency_prefix", &self.emergency_prefix)
            .finish_non_exhaustive()
    }
}
