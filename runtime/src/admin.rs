//! Administrative counter operations.
//!
//! Pre-provisioning and read-only inspection for operators. Nothing here is
//! on the order-creation path, and listed counts must never be used to compute
//! the next order number.

use crate::resolver::MonthKeyResolver;
use chrono::SubsecRound;
use order_sequence_core::counter::CounterRecord;
use order_sequence_core::counter_store::{CounterStore, CounterStoreError};
use order_sequence_core::month::MonthKey;
use std::sync::Arc;

/// Operator-facing counter operations.
#[derive(Clone)]
pub struct CounterAdmin {
    store: Arc<dyn CounterStore>,
    resolver: MonthKeyResolver,
}

impl CounterAdmin {
    /// Create admin operations over `store`, resolving "current month" with
    /// `resolver`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, resolver: MonthKeyResolver) -> Self {
        Self { store, resolver }
    }

    /// Make sure a counter exists for `month_key` (default: the current month).
    ///
    /// Idempotent: an existing record is returned unchanged; otherwise a record
    /// with `count = 0` and `initialized = true` is created.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the store failed
    pub async fn initialize_counter(
        &self,
        month_key: Option<MonthKey>,
    ) -> Result<CounterRecord, CounterStoreError> {
        let month_key = month_key.unwrap_or_else(|| self.resolver.current_month_key());
        // Microseconds: the finest timestamp precision a backing store keeps.
        let now = self.resolver.clock().now().trunc_subsecs(6);
        let seeded = CounterRecord::seeded(month_key, now);
        let record = self.store.create_if_absent(seeded.clone()).await?;

        if record == seeded {
            tracing::info!(%month_key, "Counter initialized");
        } else {
            tracing::info!(%month_key, count = ?record.count, "Counter already exists");
        }
        Ok(record)
    }

    /// Every counter, ordered by month.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: the store failed
    pub async fn list_counters(&self) -> Result<Vec<CounterRecord>, CounterStoreError> {
        let counters = self.store.list().await?;
        tracing::debug!(count = counters.len(), "Listed counters");
        Ok(counters)
    }
}

impl std::fmt::Debug for CounterAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterAdmin")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
