//! # Order Sequence Core
//!
//! Core traits and types for the monthly order-number sequence generator.
//!
//! Order numbers have the form `YYYYMM##`: a month key followed by a sequence
//! number that restarts every calendar month and is zero-padded to at least two
//! digits (`20250801`, `20250802`, ..., `20250899`, `202508100`).
//!
//! ## Core Concepts
//!
//! - **Month key** ([`month::MonthKey`]): the `YYYYMM` partition a counter belongs to
//! - **Counter record** ([`counter::CounterRecord`]): the persisted per-month count
//! - **Counter store** ([`counter_store::CounterStore`]): transactional key-value
//!   storage for counter records
//! - **Order number** ([`order_number::OrderNumber`]): the formatted identifier
//!   handed to the order collaborator
//! - **Environment** ([`environment`]): injected dependencies such as the clock
//!
//! ## Example
//!
//! ```
//! use order_sequence_core::month::MonthKey;
//! use order_sequence_core::order_number::format_order_number;
//!
//! let month: MonthKey = "202508".parse().unwrap();
//! assert_eq!(format_order_number(&month, 1), "20250801");
//! assert_eq!(format_order_number(&month, 100), "202508100");
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod counter;
pub mod counter_store;
pub mod month;
pub mod order_number;

/// Environment module - Dependency injection traits
///
/// External dependencies the generator needs are abstracted behind traits and
/// injected, so tests can pin them down.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Clocks always report UTC. Conversion into the configured business time
    /// zone happens in the month-key resolver, never through the host's local
    /// time zone.
    ///
    /// # Examples
    ///
    /// ```
    /// use order_sequence_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
