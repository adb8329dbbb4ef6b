//! Generator configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ORDER_SEQUENCE_TIME_ZONE` | `Asia/Colombo` | IANA zone month keys are derived in |
//! | `ORDER_SEQUENCE_TX_MAX_RETRIES` | `2` | Retries of a contended transaction |
//! | `ORDER_SEQUENCE_TX_RETRY_DELAY_MS` | `25` | Delay before the first retry |
//! | `ORDER_SEQUENCE_EMERGENCY_PREFIX` | `EMG-` | Prefix of emergency identifiers |
//!
//! Every value is validated once, at startup. A bad zone name is a fatal
//! configuration error, not something discovered while creating an order.

use crate::resolver::DEFAULT_TIME_ZONE;
use crate::retry::RetryPolicy;
use chrono_tz::Tz;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the business time zone.
pub const TIME_ZONE_VAR: &str = "ORDER_SEQUENCE_TIME_ZONE";
/// Environment variable with the transaction retry budget.
pub const TX_MAX_RETRIES_VAR: &str = "ORDER_SEQUENCE_TX_MAX_RETRIES";
/// Environment variable with the initial retry delay in milliseconds.
pub const TX_RETRY_DELAY_VAR: &str = "ORDER_SEQUENCE_TX_RETRY_DELAY_MS";
/// Environment variable with the emergency identifier prefix.
pub const EMERGENCY_PREFIX_VAR: &str = "ORDER_SEQUENCE_EMERGENCY_PREFIX";

/// Default emergency identifier prefix.
pub const DEFAULT_EMERGENCY_PREFIX: &str = "EMG-";

/// Configuration errors, all surfaced at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The zone name is not in the time zone database.
    #[error("Unknown time zone {0:?}")]
    InvalidTimeZone(String),

    /// A variable could not be parsed.
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The emergency prefix could be confused with a sequenced order number.
    #[error("Invalid emergency prefix {0:?}: must be non-empty and must not start with a digit")]
    InvalidEmergencyPrefix(String),

    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
}

/// Settings of the order-number generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceConfig {
    /// Zone month keys are derived in.
    pub time_zone: Tz,
    /// Retry budget for contended transactions.
    pub transaction_retry: RetryPolicy,
    /// Prefix of emergency identifiers.
    pub emergency_prefix: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE,
            transaction_retry: RetryPolicy::default(),
            emergency_prefix: DEFAULT_EMERGENCY_PREFIX.to_string(),
        }
    }
}

impl SequenceConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value. Unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let time_zone = match lookup(TIME_ZONE_VAR) {
            Some(name) => parse_time_zone(&name)?,
            None => defaults.time_zone,
        };

        let mut retry = RetryPolicy::builder();
        if let Some(raw) = lookup(TX_MAX_RETRIES_VAR) {
            retry = retry.max_retries(parse_number(TX_MAX_RETRIES_VAR, &raw)?);
        }
        if let Some(raw) = lookup(TX_RETRY_DELAY_VAR) {
            retry = retry.initial_delay(Duration::from_millis(parse_number(TX_RETRY_DELAY_VAR, &raw)?));
        }

        let emergency_prefix = match lookup(EMERGENCY_PREFIX_VAR) {
            Some(prefix) => validate_emergency_prefix(prefix)?,
            None => defaults.emergency_prefix,
        };

        Ok(Self {
            time_zone,
            transaction_retry: retry.build(),
            emergency_prefix,
        })
    }
}

/// Parse an IANA zone name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeZone`] if the zone is unknown.
pub fn parse_time_zone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimeZone(name.to_string()))
}

/// Check that `prefix` can never be mistaken for a `YYYYMM##` number.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEmergencyPrefix`] if `prefix` is empty or
/// starts with an ASCII digit.
pub fn validate_emergency_prefix(prefix: String) -> Result<String, ConfigError> {
    match prefix.chars().next() {
        Some(first) if !first.is_ascii_digit() => Ok(prefix),
        _ => Err(ConfigError::InvalidEmergencyPrefix(prefix)),
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SequenceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SequenceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, SequenceConfig::default());
        assert_eq!(config.time_zone, chrono_tz::Asia::Colombo);
        assert_eq!(config.emergency_prefix, "EMG-");
        assert_eq!(config.transaction_retry.max_retries, 2);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            (TIME_ZONE_VAR, "Europe/Berlin"),
            (TX_MAX_RETRIES_VAR, "0"),
            (TX_RETRY_DELAY_VAR, "5"),
            (EMERGENCY_PREFIX_VAR, "TMP_"),
        ])
        .unwrap();

        assert_eq!(config.time_zone, chrono_tz::Europe::Berlin);
        assert_eq!(config.transaction_retry.max_retries, 0);
        assert_eq!(config.transaction_retry.initial_delay, Duration::from_millis(5));
        assert_eq!(config.emergency_prefix, "TMP_");
    }

    #[test]
    fn unknown_zone_is_rejected() {
        assert_eq!(
            load(&[(TIME_ZONE_VAR, "Mars/Olympus_Mons")]),
            Err(ConfigError::InvalidTimeZone("Mars/Olympus_Mons".to_string()))
        );
    }

    #[test]
    fn digit_or_empty_prefix_is_rejected() {
        assert!(matches!(
            load(&[(EMERGENCY_PREFIX_VAR, "2025")]),
            Err(ConfigError::InvalidEmergencyPrefix(_))
        ));
        assert!(matches!(
            load(&[(EMERGENCY_PREFIX_VAR, "")]),
            Err(ConfigError::InvalidEmergencyPrefix(_))
        ));
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let err = load(&[(TX_MAX_RETRIES_VAR, "many")]).unwrap_err();
        assert!(err.to_string().contains(TX_MAX_RETRIES_VAR));
    }
}
