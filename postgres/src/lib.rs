//! `PostgreSQL` counter store for the order sequence generator.
//!
//! This crate provides a PostgreSQL-backed implementation of the
//! `CounterStore` trait from `order-sequence-core`. It uses sqlx with runtime
//! queries and supports:
//!
//! - Single-key increment transactions serialized by a row lock
//! - Plain reads and upserts for the non-atomic fallback
//! - Idempotent counter creation and ordered listing for administration
//! - Embedded migrations
//!
//! # Example
//!
//! ```no_run
//! use order_sequence_postgres::PostgresCounterStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresCounterStore::new("postgres://localhost/orders").await?;
//!     store.migrate().await?;
//!     store.close().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod counter_store;

pub use counter_store::{DEFAULT_MAX_CONNECTIONS, PostgresCounterStore};
