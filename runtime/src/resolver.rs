//! Month-key resolution in a fixed business time zone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use order_sequence_core::environment::Clock;
use order_sequence_core::month::MonthKey;
use std::sync::Arc;

/// Default business time zone (UTC+05:30).
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Asia::Colombo;

/// Converts instants into month keys in one configured time zone.
///
/// The clock reports UTC and the conversion uses the compiled-in zone
/// database, so the result never depends on the host's `TZ` setting. The zone
/// is fixed at construction; an unknown zone name is rejected when the
/// configuration is loaded, never at call time.
///
/// # Example
///
/// ```
/// use order_sequence_runtime::resolver::MonthKeyResolver;
/// use order_sequence_core::environment::SystemClock;
/// use chrono::{TimeZone, Utc};
/// use std::sync::Arc;
///
/// let resolver = MonthKeyResolver::new(chrono_tz::Asia::Colombo, Arc::new(SystemClock));
///
/// // 18:30 UTC on July 31st is already midnight, August 1st, in Colombo.
/// let instant = Utc.with_ymd_and_hms(2025, 7, 31, 18, 30, 0).unwrap();
/// assert_eq!(resolver.month_key_at(instant).to_string(), "202508");
/// ```
#[derive(Clone)]
pub struct MonthKeyResolver {
    zone: Tz,
    clock: Arc<dyn Clock>,
}

impl MonthKeyResolver {
    /// Create a resolver for `zone` reading time from `clock`.
    #[must_use]
    pub fn new(zone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { zone, clock }
    }

    /// Month key of "now".
    #[must_use]
    pub fn current_month_key(&self) -> MonthKey {
        self.month_key_at(self.clock.now())
    }

    /// Month key of `instant` in the configured zone.
    #[must_use]
    pub fn month_key_at(&self, instant: DateTime<Utc>) -> MonthKey {
        MonthKey::from_date(&instant.with_timezone(&self.zone))
    }

    /// The configured zone.
    #[must_use]
    pub const fn zone(&self) -> Tz {
        self.zone
    }

    /// The clock this resolver reads.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for MonthKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonthKeyResolver")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;
    use order_sequence_testing::mocks::FixedClock;

    fn resolver_at(zone: Tz, instant: DateTime<Utc>) -> MonthKeyResolver {
        MonthKeyResolver::new(zone, Arc::new(FixedClock::new(instant)))
    }

    #[test]
    fn stable_across_local_midnight() {
        let zone = DEFAULT_TIME_ZONE;
        // 23:59:59.999 on July 31st, Colombo time.
        let before = Utc.with_ymd_and_hms(2025, 7, 31, 18, 29, 59).unwrap()
            + chrono::Duration::milliseconds(999);
        let at = Utc.with_ymd_and_hms(2025, 7, 31, 18, 30, 0).unwrap();

        assert_eq!(resolver_at(zone, before).current_month_key().to_string(), "202507");
        assert_eq!(resolver_at(zone, at).current_month_key().to_string(), "202508");
    }

    #[test]
    fn same_instant_differs_by_zone_not_by_host() {
        let instant = Utc.with_ymd_and_hms(2025, 7, 31, 20, 0, 0).unwrap();

        assert_eq!(resolver_at(chrono_tz::UTC, instant).current_month_key().to_string(), "202507");
        assert_eq!(
            resolver_at(chrono_tz::Asia::Colombo, instant).current_month_key().to_string(),
            "202508"
        );
        assert_eq!(
            resolver_at(chrono_tz::America::New_York, instant)
                .current_month_key()
                .to_string(),
            "202507"
        );
    }

    #[test]
    fn year_rolls_over_in_zone() {
        let instant = Utc.with_ymd_and_hms(2025, 12, 31, 19, 0, 0).unwrap();
        assert_eq!(
            resolver_at(DEFAULT_TIME_ZONE, instant).current_month_key().to_string(),
            "202601"
        );
    }
}
