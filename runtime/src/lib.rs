//! # Order Sequence Runtime
//!
//! Runtime implementation of the monthly order-number generator.
//!
//! This crate turns a [`CounterStore`](order_sequence_core::counter_store::CounterStore)
//! into `YYYYMM##` order numbers and keeps order creation going when the store
//! misbehaves.
//!
//! ## Core Components
//!
//! - **Generator** ([`OrderNumberGenerator`]): transactional increment with
//!   bounded retry, non-atomic fallback and emergency identifiers
//! - **Resolver** ([`MonthKeyResolver`]): "now" to month key in the business time zone
//! - **Admin** ([`CounterAdmin`]): counter pre-provisioning and listing
//! - **Config** ([`SequenceConfig`]): environment-driven settings
//! - **Metrics**: Prometheus counters for every degraded-mode transition
//!
//! ## Example
//!
//! ```
//! use order_sequence_runtime::{OrderNumberGenerator, SequenceConfig};
//! use order_sequence_core::order_number::NumberingMode;
//! use order_sequence_testing::mocks::{InMemoryCounterStore, test_clock};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let generator = OrderNumberGenerator::from_config(
//!     Arc::new(InMemoryCounterStore::new()),
//!     Arc::new(test_clock()),
//!     &SequenceConfig::default(),
//! );
//!
//! let number = generator.next_order_number().await;
//! assert_eq!(number.as_str(), "20250801");
//! assert_eq!(number.mode(), NumberingMode::Transactional);
//! # });
//! ```

/// Administrative counter operations
pub mod admin;

/// Environment-driven configuration
pub mod config;

/// The order-number generator and its fallback chain
pub mod generator;

/// Prometheus metrics for observability
pub mod metrics;

/// Month-key resolution in the business time zone
pub mod resolver;

/// Retry logic with exponential backoff
pub mod retry;

pub use admin::CounterAdmin;
pub use config::{ConfigError, SequenceConfig};
pub use generator::OrderNumberGenerator;
pub use resolver::{DEFAULT_TIME_ZONE, MonthKeyResolver};
pub use retry::RetryPolicy;
