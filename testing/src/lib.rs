//! # Order Sequence Testing
//!
//! Testing utilities for the order sequence generator.
//!
//! This crate provides:
//! - [`mocks::FixedClock`]: deterministic time
//! - [`mocks::InMemoryCounterStore`]: a faithful in-memory emulation of a
//!   transactional counter store, in pessimistic or optimistic isolation
//! - [`mocks::FaultyCounterStore`]: wraps any store and injects failures
//!
//! ## Example
//!
//! ```
//! use order_sequence_testing::mocks::InMemoryCounterStore;
//! use order_sequence_core::counter_store::CounterStore;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryCounterStore::new();
//! assert!(store.list().await.unwrap().is_empty());
//! # });
//! ```

pub mod mocks;

// Re-export commonly used items
pub use mocks::{Fault, FaultyCounterStore, FixedClock, InMemoryCounterStore, IsolationMode, test_clock};
