//! Storage usage readings

use serde::{Deserialize, Serialize};

/// A user's storage quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    /// Hard limit in bytes
    Bytes(u64),
    /// No limit configured
    Unlimited,
}

impl Quota {
    /// Interpret a raw byte count where hosts encode "unlimited" as a
    /// negative value or as no value at all.
    pub fn from_raw(raw: Option<i64>) -> Self {
        match raw {
            Some(bytes) if bytes >= 0 => Self::Bytes(bytes as u64),
            _ => Self::Unlimited,
        }
    }
}

/// Relative storage usage for one user, fetched fresh for every check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageReading {
    /// Configured quota
    pub quota: Quota,
    /// Used bytes divided by quota bytes, in `[0, 1]`
    pub relative: f64,
}

impl UsageReading {
    /// Create a reading, clamping `relative` into `[0, 1]`
    pub fn new(quota: Quota, relative: f64) -> Self {
        let relative = if relative.is_finite() {
            relative.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { quota, relative }
    }

    /// Reading for a user whose storage could not be located
    pub fn zero() -> Self {
        Self {
            quota: Quota::Unlimited,
            relative: 0.0,
        }
    }

    /// Build a reading from used and total byte counts
    pub fn from_bytes(quota: Quota, used_bytes: u64) -> Self {
        let relative = match quota {
            Quota::Bytes(0) | Quota::Unlimited => 0.0,
            Quota::Bytes(total) => used_bytes as f64 / total as f64,
        };
        Self::new(quota, relative)
    }

    /// Percentage used for alerting purposes
    ///
    /// Unlimited quotas and quotas below `min_quota_bytes` always report 0.
    pub fn alerting_percentage(&self, min_quota_bytes: u64) -> f64 {
        match self.quota {
            Quota::Bytes(bytes) if bytes >= min_quota_bytes => self.relative * 100.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_negative_quota_is_unlimited() {
        assert_eq!(Quota::from_raw(Some(-3)), Quota::Unlimited);
        assert_eq!(Quota::from_raw(None), Quota::Unlimited);
        assert_eq!(Quota::from_raw(Some(42)), Quota::Bytes(42));
    }

    #[test]
    fn test_relative_is_clamped() {
        assert_eq!(UsageReading::new(Quota::Bytes(10 * MIB), 1.7).relative, 1.0);
        assert_eq!(UsageReading::new(Quota::Bytes(10 * MIB), -0.2).relative, 0.0);
        assert_eq!(UsageReading::new(Quota::Bytes(10 * MIB), f64::NAN).relative, 0.0);
    }

    #[test]
    fn test_zero_reading_never_alerts() {
        let reading = UsageReading::zero();
        assert_eq!(reading.relative, 0.0);
        assert_eq!(reading.alerting_percentage(0), 0.0);
    }

    #[test]
    fn test_from_bytes() {
        let reading = UsageReading::from_bytes(Quota::Bytes(200), 50);
        assert!((reading.relative - 0.25).abs() < f64::EPSILON);
        assert_eq!(UsageReading::from_bytes(Quota::Bytes(0), 50).relative, 0.0);
    }

    #[test]
    fn test_quota_at_minimum_is_not_exempt() {
        let reading = UsageReading::new(Quota::Bytes(5 * MIB), 0.9);
        assert!((reading.alerting_percentage(5 * MIB) - 90.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn small_quotas_never_alert(bytes in 0u64..(5 * MIB), relative in 0.0f64..=1.0) {
            let reading = UsageReading::new(Quota::Bytes(bytes), relative);
            prop_assert_eq!(reading.alerting_percentage(5 * MIB), 0.0);
        }

        #[test]
        fn unlimited_quotas_never_alert(relative in 0.0f64..=1.0) {
            let reading = UsageReading::new(Quota::Unlimited, relative);
            prop_assert_eq!(reading.alerting_percentage(5 * MIB), 0.0);
        }

        #[test]
        fn percentage_stays_in_range(bytes in (5 * MIB)..u64::MAX, relative in -1.0f64..2.0) {
            let pct = UsageReading::new(Quota::Bytes(bytes), relative).alerting_percentage(5 * MIB);
            prop_assert!((0.0..=100.0).contains(&pct));
        }
    }
}
