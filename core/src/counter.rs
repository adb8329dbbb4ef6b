//! Counter records: the per-month state behind every order number.
//!
//! A counter record is the only shared mutable state of the generator. It is
//! created lazily by the first increment of a month (or eagerly by
//! administrative initialization) and never deleted.

use crate::counter_store::CounterStoreError;
use crate::month::MonthKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `count` field of a counter record as it was found in storage.
///
/// Counter records live in a document-shaped store, so the field may be
/// missing (administrative pre-seeding that only wrote metadata) or hold a
/// non-numeric value (manual edits, foreign writers). Both cases are recovered
/// by the increment protocol as "nothing issued yet".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RecordCount {
    /// No `count` field at all.
    Missing,
    /// A valid, non-negative count: the last sequence number issued.
    Value(u64),
    /// A `count` field that is not a non-negative integer, kept verbatim.
    Corrupt(String),
}

impl RecordCount {
    /// Interpret a raw JSON `count` field.
    ///
    /// `None` and JSON `null` are [`RecordCount::Missing`]; unsigned integers
    /// are [`RecordCount::Value`]; anything else (strings, floats, negative
    /// numbers, objects) is [`RecordCount::Corrupt`].
    ///
    /// # Examples
    ///
    /// ```
    /// use order_sequence_core::counter::RecordCount;
    /// use serde_json::json;
    ///
    /// assert_eq!(RecordCount::from_json(None), RecordCount::Missing);
    /// assert_eq!(RecordCount::from_json(Some(&json!(7))), RecordCount::Value(7));
    /// assert_eq!(
    ///     RecordCount::from_json(Some(&json!("seven"))),
    ///     RecordCount::Corrupt("\"seven\"".to_string()),
    /// );
    /// ```
    #[must_use]
    pub fn from_json(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            None | Some(serde_json::Value::Null) => Self::Missing,
            Some(value) => value
                .as_u64()
                .map_or_else(|| Self::Corrupt(value.to_string()), Self::Value),
        }
    }

    /// Render back into the JSON field stored by document-shaped backends.
    ///
    /// Corrupt values are written back as the JSON they were read from, or as a
    /// JSON string if they no longer parse.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Missing => None,
            Self::Value(count) => Some(serde_json::Value::from(*count)),
            Self::Corrupt(raw) => Some(
                serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone())),
            ),
        }
    }

    /// The count, if it is usable.
    #[must_use]
    pub const fn value(&self) -> Option<u64> {
        match self {
            Self::Value(count) => Some(*count),
            Self::Missing | Self::Corrupt(_) => None,
        }
    }
}

/// Persisted per-month counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Month this counter belongs to. Immutable once created.
    pub month_key: MonthKey,
    /// Last sequence number issued for the month.
    pub count: RecordCount,
    /// Time of the last successful write. Observability only.
    pub last_updated: Option<DateTime<Utc>>,
    /// Set when the record was created by administrative pre-seeding.
    pub initialized: bool,
}

impl CounterRecord {
    /// A freshly pre-seeded record: nothing issued yet.
    #[must_use]
    pub const fn seeded(month_key: MonthKey, now: DateTime<Utc>) -> Self {
        Self {
            month_key,
            count: RecordCount::Value(0),
            last_updated: Some(now),
            initialized: true,
        }
    }

    /// Last sequence number issued according to this record.
    ///
    /// A missing `count` means nothing has been issued yet and yields `0`.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::CorruptRecord`] if `count` is present but
    /// not a non-negative integer. Callers recover by treating it as `0`.
    pub fn last_issued(&self) -> Result<u64, CounterStoreError> {
        match &self.count {
            RecordCount::Missing => Ok(0),
            RecordCount::Value(count) => Ok(*count),
            RecordCount::Corrupt(raw) => Err(CounterStoreError::CorruptRecord {
                month_key: self.month_key,
                raw: raw.clone(),
            }),
        }
    }

    /// Apply an increment write: `count` and `last_updated` change, the
    /// `initialized` marker is left as it was.
    pub fn apply(&mut self, write: &CounterWrite) {
        self.count = RecordCount::Value(write.count);
        self.last_updated = Some(write.last_updated);
    }
}

/// The only mutation the increment paths ever perform on a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterWrite {
    /// New count: exactly one more than the count that was read.
    pub count: u64,
    /// Time of the write.
    pub last_updated: DateTime<Utc>,
}

impl CounterWrite {
    /// Turn this write into the record it produces when no record exists yet.
    #[must_use]
    pub const fn into_record(self, month_key: MonthKey) -> CounterRecord {
        CounterRecord {
            month_key,
            count: RecordCount::Value(self.count),
            last_updated: Some(self.last_updated),
            initialized: false,
        }
    }
}
