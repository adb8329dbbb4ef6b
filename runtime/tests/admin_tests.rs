//! Integration tests for administrative counter operations

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use order_sequence_core::counter::{CounterRecord, RecordCount};
use order_sequence_core::counter_store::{CounterStore, CounterStoreError};
use order_sequence_core::environment::{Clock, SystemClock};
use order_sequence_core::month::MonthKey;
use order_sequence_runtime::{CounterAdmin, DEFAULT_TIME_ZONE, MonthKeyResolver, OrderNumberGenerator};
use order_sequence_testing::mocks::{FaultyCounterStore, InMemoryCounterStore, test_clock};
use std::sync::Arc;

fn resolver() -> MonthKeyResolver {
    MonthKeyResolver::new(DEFAULT_TIME_ZONE, Arc::new(test_clock()))
}

fn month(key: &str) -> MonthKey {
    key.parse().unwrap()
}

#[tokio::test]
async fn initialize_creates_seeded_record_for_current_month() {
    let store = InMemoryCounterStore::new();
    let admin = CounterAdmin::new(Arc::new(store.clone()), resolver());

    let record = admin.initialize_counter(None).await.unwrap();

    assert_eq!(record.month_key, month("202508"));
    assert_eq!(record.count, RecordCount::Value(0));
    assert!(record.initialized);
    assert_eq!(record.last_updated, Some(test_clock().now()));
    assert_eq!(store.snapshot(month("202508")).await, Some(record));
}

#[tokio::test]
async fn initialize_is_idempotent_and_never_resets_a_count() {
    let store = InMemoryCounterStore::new();
    let shared: Arc<dyn CounterStore> = Arc::new(store.clone());
    let admin = CounterAdmin::new(Arc::clone(&shared), resolver());
    let generator = OrderNumberGenerator::new(shared, resolver());

    admin.initialize_counter(None).await.unwrap();
    generator.next_order_number().await;
    generator.next_order_number().await;

    let again = admin.initialize_counter(None).await.unwrap();
    assert_eq!(again.count, RecordCount::Value(2));
    assert_eq!(generator.next_order_number().await.as_str(), "20250803");
}

#[tokio::test]
async fn initialize_accepts_explicit_month() {
    let store = InMemoryCounterStore::new();
    let admin = CounterAdmin::new(Arc::new(store.clone()), resolver());

    let record = admin.initialize_counter(Some(month("202612"))).await.unwrap();

    assert_eq!(record.month_key, month("202612"));
    assert!(store.snapshot(month("202508")).await.is_none());
}

#[tokio::test]
async fn initialize_twice_returns_identical_record() {
    let admin = CounterAdmin::new(Arc::new(InMemoryCounterStore::new()), resolver());

    let first = admin.initialize_counter(Some(month("202507"))).await.unwrap();
    let second = admin.initialize_counter(Some(month("202507"))).await.unwrap();

    assert_eq!(first.count, RecordCount::Value(0));
    assert!(first.initialized);
    assert_eq!(first, second);
}

#[tokio::test]
async fn initialize_with_system_clock_stores_microsecond_timestamp() {
    let store = InMemoryCounterStore::new();
    let resolver = MonthKeyResolver::new(DEFAULT_TIME_ZONE, Arc::new(SystemClock));
    let admin = CounterAdmin::new(Arc::new(store.clone()), resolver);

    let first = admin.initialize_counter(Some(month("202507"))).await.unwrap();
    let second = admin.initialize_counter(Some(month("202507"))).await.unwrap();

    let stamped = first.last_updated.unwrap();
    assert_eq!(stamped.timestamp_subsec_nanos() % 1_000, 0);
    assert_eq!(first, second);
    assert_eq!(store.snapshot(month("202507")).await, Some(first));
}

#[tokio::test]
async fn first_order_after_initialization_is_one() {
    let shared: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
    let admin = CounterAdmin::new(Arc::clone(&shared), resolver());
    let generator = OrderNumberGenerator::new(shared, resolver());

    admin.initialize_counter(None).await.unwrap();

    assert_eq!(generator.next_order_number().await.as_str(), "20250801");
}

#[tokio::test]
async fn list_returns_every_counter_ordered_by_month() {
    let store = InMemoryCounterStore::new();
    store
        .seed(CounterRecord {
            month_key: month("202508"),
            count: RecordCount::Value(17),
            last_updated: None,
            initialized: false,
        })
        .await;
    let admin = CounterAdmin::new(Arc::new(store), resolver());
    admin.initialize_counter(Some(month("202507"))).await.unwrap();
    admin.initialize_counter(Some(month("202412"))).await.unwrap();

    let counters = admin.list_counters().await.unwrap();

    let keys: Vec<String> = counters.iter().map(|c| c.month_key.to_string()).collect();
    assert_eq!(keys, vec!["202412", "202507", "202508"]);
    assert_eq!(counters[2].count, RecordCount::Value(17));
}

#[tokio::test]
async fn admin_operations_surface_store_failures() {
    let store = FaultyCounterStore::new(InMemoryCounterStore::new());
    store.fail_plain_operations(true);
    let admin = CounterAdmin::new(Arc::new(store), resolver());

    assert!(matches!(
        admin.initialize_counter(None).await,
        Err(CounterStoreError::Unavailable(_))
    ));
    assert!(matches!(
        admin.list_counters().await,
        Err(CounterStoreError::Unavailable(_))
    ));
}
