//! Month keys: the `YYYYMM` partition every counter record belongs to.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `MonthKey` parsing and construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid month key: {0}")]
pub struct ParseMonthKeyError(String);

/// Canonical `YYYYMM` identifier of one calendar month.
///
/// A month key identifies exactly one counter record. It is always derived in
/// the configured business time zone (see the runtime's month-key resolver),
/// so the same instant maps to the same key on every host.
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates external input (exactly six ASCII digits,
///   month `01..=12`)
/// - [`MonthKey::new`]: Validates numeric parts
/// - [`MonthKey::from_date`]: No validation needed (chrono dates are valid)
///
/// Keys order chronologically.
///
/// # Examples
///
/// ```
/// use order_sequence_core::month::MonthKey;
///
/// let key: MonthKey = "202508".parse().unwrap();
/// assert_eq!(key.year(), 2025);
/// assert_eq!(key.month(), 8);
/// assert_eq!(key.to_string(), "202508");
///
/// assert!("202513".parse::<MonthKey>().is_err());
/// assert!("2025-08".parse::<MonthKey>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Create a month key from a year and a one-based month.
    ///
    /// # Errors
    ///
    /// Returns [`ParseMonthKeyError`] if the year is outside `0..=9999` or the
    /// month outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, ParseMonthKeyError> {
        if !(0..=9999).contains(&year) {
            return Err(ParseMonthKeyError(format!(
                "year {year} does not fit in four digits"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(ParseMonthKeyError(format!("month {month} is not in 1..=12")));
        }
        Ok(Self { year, month })
    }

    /// Month key of a calendar date (or date-time) in whatever zone it carries.
    ///
    /// Years outside `0..=9999` are clamped to that range so the key always
    /// renders as six digits.
    #[must_use]
    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year().clamp(0, 9999),
            month: date.month(),
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// One-based calendar month.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ParseMonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseMonthKeyError(format!(
                "{s:?} is not six digits in YYYYMM form"
            )));
        }
        let year = s[..4]
            .parse::<i32>()
            .map_err(|e| ParseMonthKeyError(format!("{s:?}: {e}")))?;
        let month = s[4..]
            .parse::<u32>()
            .map_err(|e| ParseMonthKeyError(format!("{s:?}: {e}")))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = ParseMonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}
