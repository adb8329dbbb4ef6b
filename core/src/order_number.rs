//! Order numbers and the formatter that renders them.

use crate::month::MonthKey;
use chrono::{DateTime, Utc};
use std::fmt;

/// How an order number was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberingMode {
    /// Issued by a committed transactional increment. Unique within the month.
    Transactional,
    /// Issued by the non-atomic fallback. May duplicate a concurrent number.
    NonAtomic,
    /// Emergency identifier. Opaque, unique only to millisecond resolution.
    Emergency,
}

impl NumberingMode {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transactional => "transactional",
            Self::NonAtomic => "non_atomic",
            Self::Emergency => "emergency",
        }
    }

    /// Whether numbers in this mode lose the uniqueness guarantee.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        !matches!(self, Self::Transactional)
    }
}

impl fmt::Display for NumberingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `(month_key, sequence)` as `YYYYMM` followed by the sequence
/// zero-padded to at least two digits.
///
/// The padding is a minimum width: sequences of 100 and above widen the
/// identifier instead of being truncated.
///
/// # Examples
///
/// ```
/// use order_sequence_core::order_number::format_order_number;
///
/// let month = "202508".parse().unwrap();
/// assert_eq!(format_order_number(&month, 1), "20250801");
/// assert_eq!(format_order_number(&month, 13), "20250813");
/// assert_eq!(format_order_number(&month, 100), "202508100");
/// ```
#[must_use]
pub fn format_order_number(month_key: &MonthKey, sequence: u64) -> String {
    format!("{month_key}{sequence:02}")
}

/// The identifier handed to the order collaborator.
///
/// The string form (`Display`, [`OrderNumber::as_str`]) is consumed verbatim
/// as an immutable field of the new order record. Emergency identifiers are
/// opaque and must not be parsed or sorted as sequence numbers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderNumber {
    value: String,
    mode: NumberingMode,
}

impl OrderNumber {
    /// A sequence-based order number (`YYYYMM##`).
    #[must_use]
    pub fn sequenced(month_key: &MonthKey, sequence: u64, mode: NumberingMode) -> Self {
        Self {
            value: format_order_number(month_key, sequence),
            mode,
        }
    }

    /// An emergency identifier: `prefix` followed by the Unix time of `at` in
    /// milliseconds.
    #[must_use]
    pub fn emergency(prefix: &str, at: DateTime<Utc>) -> Self {
        Self {
            value: format!("{prefix}{}", at.timestamp_millis()),
            mode: NumberingMode::Emergency,
        }
    }

    /// The identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// How the number was obtained.
    #[must_use]
    pub const fn mode(&self) -> NumberingMode {
        self.mode
    }

    /// Convert into the identifier string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.value
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.value
    }
}
