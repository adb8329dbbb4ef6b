//! Failure injection around a counter store.

use order_sequence_core::counter::{CounterRecord, CounterWrite};
use order_sequence_core::counter_store::{
    CounterStore, CounterStoreError, CounterTransaction, StoreFuture,
};
use order_sequence_core::month::MonthKey;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Failure injected into transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every commit aborts with [`CounterStoreError::Contention`].
    Contention,
    /// Every `begin` fails with [`CounterStoreError::Unavailable`].
    Unavailable,
}

const NO_FAULT: u8 = 0;
const CONTENTION: u8 = 1;
const UNAVAILABLE: u8 = 2;

/// Wraps a counter store and fails selected operations on demand.
///
/// Faults can be switched at any time; the wrapped store is untouched by
/// operations that fail.
///
/// # Example
///
/// ```
/// use order_sequence_testing::mocks::{Fault, FaultyCounterStore, InMemoryCounterStore};
///
/// let store = FaultyCounterStore::new(InMemoryCounterStore::new());
/// store.fail_transactions(Fault::Unavailable);
/// store.fail_plain_operations(true);
/// ```
pub struct FaultyCounterStore<S> {
    inner: S,
    transaction_fault: AtomicU8,
    failing_commits: AtomicUsize,
    plain_down: AtomicBool,
    transactions_begun: AtomicUsize,
    plain_writes: AtomicUsize,
}

impl<S: CounterStore> FaultyCounterStore<S> {
    /// Wrap `inner` with no faults active.
    #[must_use]
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            transaction_fault: AtomicU8::new(NO_FAULT),
            failing_commits: AtomicUsize::new(0),
            plain_down: AtomicBool::new(false),
            transactions_begun: AtomicUsize::new(0),
            plain_writes: AtomicUsize::new(0),
        }
    }

    /// Fail every transaction with `fault` until [`Self::heal`].
    pub fn fail_transactions(&self, fault: Fault) {
        let code = match fault {
            Fault::Contention => CONTENTION,
            Fault::Unavailable => UNAVAILABLE,
        };
        self.transaction_fault.store(code, Ordering::SeqCst);
    }

    /// Abort the next `n` commits with contention, then behave normally.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Make plain `load`/`store` fail (or succeed again).
    pub fn fail_plain_operations(&self, down: bool) {
        self.plain_down.store(down, Ordering::SeqCst);
    }

    /// Clear every active fault.
    pub fn heal(&self) {
        self.transaction_fault.store(NO_FAULT, Ordering::SeqCst);
        self.failing_commits.store(0, Ordering::SeqCst);
        self.plain_down.store(false, Ordering::SeqCst);
    }

    /// Number of `begin` calls seen, failed or not.
    pub fn transactions_begun(&self) -> usize {
        self.transactions_begun.load(Ordering::SeqCst)
    }

    /// Number of plain `store` calls that reached the wrapped store.
    pub fn plain_writes(&self) -> usize {
        self.plain_writes.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn take_failing_commit(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn plain_guard(&self) -> Result<(), CounterStoreError> {
        if self.plain_down.load(Ordering::SeqCst) {
            return Err(CounterStoreError::Unavailable(
                "injected fault: store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

struct FaultyTransaction {
    inner: Box<dyn CounterTransaction>,
    abort_with: Option<CounterStoreError>,
}

impl CounterTransaction for FaultyTransaction {
    fn read(&mut self) -> StoreFuture<'_, Option<CounterRecord>> {
        self.inner.read()
    }

    fn write(&mut self, write: CounterWrite) {
        self.inner.write(write);
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        let this = *self;
        match this.abort_with {
            // The inner transaction is dropped uncommitted.
            Some(error) => Box::pin(async move { Err(error) }),
            None => this.inner.commit(),
        }
    }
}

impl<S: CounterStore> CounterStore for FaultyCounterStore<S> {
    fn begin(&self, month_key: MonthKey) -> StoreFuture<'_, Box<dyn CounterTransaction>> {
        Box::pin(async move {
            self.transactions_begun.fetch_add(1, Ordering::SeqCst);
            let fault = self.transaction_fault.load(Ordering::SeqCst);
            if fault == UNAVAILABLE {
                return Err(CounterStoreError::Unavailable(
                    "injected fault: transactions unavailable".to_string(),
                ));
            }

            let inner = self.inner.begin(month_key).await?;
            let abort_with = (fault == CONTENTION || self.take_failing_commit())
                .then_some(CounterStoreError::Contention { month_key });
            let tx: Box<dyn CounterTransaction> = Box::new(FaultyTransaction { inner, abort_with });
            Ok(tx)
        })
    }

    fn load(&self, month_key: MonthKey) -> StoreFuture<'_, Option<CounterRecord>> {
        Box::pin(async move {
            self.plain_guard()?;
            self.inner.load(month_key).await
        })
    }

    fn store(&self, month_key: MonthKey, write: CounterWrite) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.plain_guard()?;
            self.plain_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.store(month_key, write).await
        })
    }

    fn create_if_absent(&self, record: CounterRecord) -> StoreFuture<'_, CounterRecord> {
        Box::pin(async move {
            self.plain_guard()?;
            self.inner.create_if_absent(record).await
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<CounterRecord>> {
        Box::pin(async move {
            self.plain_guard()?;
            self.inner.list().await
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::mocks::InMemoryCounterStore;
    use chrono::Utc;

    fn august() -> MonthKey {
        "202508".parse().unwrap()
    }

    #[tokio::test]
    async fn failing_commits_are_counted_down() {
        let store = FaultyCounterStore::new(InMemoryCounterStore::new());
        store.fail_next_commits(1);

        let tx = store.begin(august()).await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_contention());
        let tx = store.begin(august()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.transactions_begun(), 2);
    }

    #[tokio::test]
    async fn aborted_commit_leaves_inner_store_untouched() {
        let store = FaultyCounterStore::new(InMemoryCounterStore::new());
        store.fail_transactions(Fault::Contention);

        let mut tx = store.begin(august()).await.unwrap();
        tx.write(CounterWrite { count: 1, last_updated: Utc::now() });
        assert!(tx.commit().await.is_err());
        assert!(store.inner().snapshot(august()).await.is_none());
    }

    #[tokio::test]
    async fn plain_operations_fail_until_healed() {
        let store = FaultyCounterStore::new(InMemoryCounterStore::new());
        store.fail_plain_operations(true);
        assert!(matches!(
            store.load(august()).await,
            Err(CounterStoreError::Unavailable(_))
        ));
        store.heal();
        assert!(store.load(august()).await.unwrap().is_none());
    }
}
