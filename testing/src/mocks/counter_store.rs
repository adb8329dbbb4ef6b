//! In-memory counter store.

use order_sequence_core::counter::{CounterRecord, CounterWrite};
use order_sequence_core::counter_store::{
    CounterStore, CounterStoreError, CounterTransaction, StoreFuture,
};
use order_sequence_core::month::MonthKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// How concurrent transactions on the same month are isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// A transaction holds a per-month lock from `begin` until it commits or is
    /// dropped. Concurrent transactions queue up and never conflict.
    #[default]
    Pessimistic,
    /// Transactions run concurrently and are validated at commit: if the
    /// record changed since the transaction read it, the commit aborts with
    /// [`CounterStoreError::Contention`].
    Optimistic,
}

#[derive(Debug)]
struct Entry {
    record: CounterRecord,
    /// Bumped on every write. An absent record is at version 0.
    version: u64,
}

type Records = Arc<Mutex<BTreeMap<MonthKey, Entry>>>;

/// In-memory counter store for tests.
///
/// Emulates a transactional document store faithfully enough to test the
/// increment protocol under real concurrency: single-key transactions are
/// either serialized ([`IsolationMode::Pessimistic`]) or validated at commit
/// ([`IsolationMode::Optimistic`]), and plain reads/writes bypass both.
///
/// Cloning shares the underlying records.
///
/// # Example
///
/// ```
/// use order_sequence_testing::mocks::{InMemoryCounterStore, IsolationMode};
/// use std::time::Duration;
///
/// let store = InMemoryCounterStore::new()
///     .with_isolation(IsolationMode::Optimistic)
///     .with_read_delay(Duration::from_millis(20));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    records: Records,
    locks: Arc<Mutex<HashMap<MonthKey, Arc<Mutex<()>>>>>,
    isolation: IsolationMode,
    read_delay: Option<Duration>,
}

impl InMemoryCounterStore {
    /// Create an empty store with pessimistic isolation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation mode for transactions.
    #[must_use]
    pub const fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// Delay every plain [`CounterStore::load`] between reading the record and
    /// returning it, widening the race window of non-atomic read-then-write.
    #[must_use]
    pub const fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Insert or replace a record verbatim, bypassing every protocol.
    ///
    /// Used to set up pre-seeded, partial or corrupt records.
    pub async fn seed(&self, record: CounterRecord) {
        let mut records = self.records.lock().await;
        let version = records.get(&record.month_key).map_or(0, |e| e.version) + 1;
        records.insert(record.month_key, Entry { record, version });
    }

    /// Current record for `month_key`, read without delay.
    pub async fn snapshot(&self, month_key: MonthKey) -> Option<CounterRecord> {
        self.records
            .lock()
            .await
            .get(&month_key)
            .map(|e| e.record.clone())
    }

    async fn month_lock(&self, month_key: MonthKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(month_key).or_default())
    }
}

/// Write `write` into `records`, creating the record if needed.
fn apply_write(records: &mut BTreeMap<MonthKey, Entry>, month_key: MonthKey, write: &CounterWrite) {
    match records.get_mut(&month_key) {
        Some(entry) => {
            entry.record.apply(write);
            entry.version += 1;
        }
        None => {
            records.insert(
                month_key,
                Entry {
                    record: write.into_record(month_key),
                    version: 1,
                },
            );
        }
    }
}

struct InMemoryTransaction {
    month_key: MonthKey,
    records: Records,
    isolation: IsolationMode,
    /// Version seen by `read`, `None` until the transaction reads.
    observed_version: Option<u64>,
    pending: Option<CounterWrite>,
    /// Held for the whole transaction in pessimistic mode.
    _guard: Option<OwnedMutexGuard<()>>,
}

impl CounterTransaction for InMemoryTransaction {
    fn read(&mut self) -> StoreFuture<'_, Option<CounterRecord>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            let entry = records.get(&self.month_key);
            self.observed_version = Some(entry.map_or(0, |e| e.version));
            Ok(entry.map(|e| e.record.clone()))
        })
    }

    fn write(&mut self, write: CounterWrite) {
        self.pending = Some(write);
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;

            if self.isolation == IsolationMode::Optimistic {
                let current = records.get(&self.month_key).map_or(0, |e| e.version);
                if self.observed_version.is_some_and(|observed| observed != current) {
                    return Err(CounterStoreError::Contention {
                        month_key: self.month_key,
                    });
                }
            }

            if let Some(write) = &self.pending {
                apply_write(&mut records, self.month_key, write);
            }
            Ok(())
        })
    }
}

impl CounterStore for InMemoryCounterStore {
    fn begin(&self, month_key: MonthKey) -> StoreFuture<'_, Box<dyn CounterTransaction>> {
        Box::pin(async move {
            let guard = match self.isolation {
                IsolationMode::Pessimistic => Some(self.month_lock(month_key).await.lock_owned().await),
                IsolationMode::Optimistic => None,
            };
            let tx: Box<dyn CounterTransaction> = Box::new(InMemoryTransaction {
                month_key,
                records: Arc::clone(&self.records),
                isolation: self.isolation,
                observed_version: None,
                pending: None,
                _guard: guard,
            });
            Ok(tx)
        })
    }

    fn load(&self, month_key: MonthKey) -> StoreFuture<'_, Option<CounterRecord>> {
        Box::pin(async move {
            let record = self.snapshot(month_key).await;
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(record)
        })
    }

    fn store(&self, month_key: MonthKey, write: CounterWrite) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            apply_write(&mut records, month_key, &write);
            Ok(())
        })
    }

    fn create_if_absent(&self, record: CounterRecord) -> StoreFuture<'_, CounterRecord> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let entry = records.entry(record.month_key).or_insert(Entry { record, version: 1 });
            Ok(entry.record.clone())
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<CounterRecord>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            Ok(records.values().map(|e| e.record.clone()).collect())
        })
    }
}
