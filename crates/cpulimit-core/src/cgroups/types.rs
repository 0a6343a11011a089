//! Data types for CFS bandwidth control

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::Bandwidth;

/// Token the kernel uses in `cpu.max` for "no limit"
pub const UNLIMITED_TOKEN: &str = "max";

/// CFS quota as found in `cpu.max`
///
/// `Unlimited` is kept apart from every finite value: a zero quota means the
/// cgroup may not run at all, which is the opposite of no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quota {
    Unlimited,
    Limited(Duration),
}

impl Quota {
    pub fn from_micros(micros: u64) -> Self {
        Self::Limited(Duration::from_micros(micros))
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Finite quota, `None` when unlimited
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Unlimited => None,
            Self::Limited(quota) => Some(*quota),
        }
    }
}

impl From<Duration> for Quota {
    fn from(quota: Duration) -> Self {
        Self::Limited(quota)
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(UNLIMITED_TOKEN),
            Self::Limited(quota) => write!(f, "{}", quota.as_micros()),
        }
    }
}

/// Quota/period pair of a cgroup (`cpu.max`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuMax {
    pub quota: Quota,
    pub period: Duration,
}

impl CpuMax {
    pub fn new(quota: Quota, period: Duration) -> Self {
        Self { quota, period }
    }

    /// Bandwidth this pair grants, `None` when unlimited
    pub fn bandwidth(&self) -> Option<Bandwidth> {
        self.quota
            .as_duration()
            .map(|quota| Bandwidth::from_quota(quota, self.period))
    }
}

impl fmt::Display for CpuMax {
    /// Same layout the kernel uses: `"<quota> <period>"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quota, self.period.as_micros())
    }
}

/// CPU statistics (`cpu.stat`)
///
/// Only `usage_usec`, `user_usec` and `system_usec` are always present. The
/// bandwidth counters appear once the cpu controller is enabled for the
/// cgroup and read as zero until then.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Total CPU time used (microseconds)
    pub usage_usec: u64,

    /// User-space CPU time
    pub user_usec: u64,

    /// Kernel-space CPU time
    pub system_usec: u64,

    /// Number of enforcement periods
    pub nr_periods: u64,

    /// Number of throttled periods
    pub nr_throttled: u64,

    /// Total throttled time (microseconds)
    pub throttled_usec: u64,
}

impl CpuStats {
    /// Calculate throttle percentage
    pub fn throttle_percentage(&self) -> f64 {
        if self.nr_periods == 0 {
            return 0.0;
        }
        (self.nr_throttled as f64 / self.nr_periods as f64) * 100.0
    }

    /// Check if being throttled
    pub fn is_throttled(&self) -> bool {
        self.nr_throttled > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_display() {
        assert_eq!(Quota::Unlimited.to_string(), "max");
        assert_eq!(Quota::from_micros(50_000).to_string(), "50000");
        assert_eq!(Quota::from_micros(0).to_string(), "0");
    }

    #[test]
    fn test_zero_quota_is_not_unlimited() {
        let zero = Quota::from_micros(0);
        assert!(!zero.is_unlimited());
        assert_ne!(zero, Quota::Unlimited);
        assert_eq!(zero.as_duration(), Some(Duration::ZERO));
        assert_eq!(Quota::Unlimited.as_duration(), None);
    }

    #[test]
    fn test_cpu_max_bandwidth() {
        let pair = CpuMax::new(Quota::from_micros(50_000), Duration::from_micros(100_000));
        assert_eq!(pair.bandwidth(), Some(Bandwidth::from_millicores(500)));
        assert_eq!(pair.to_string(), "50000 100000");

        let pair = CpuMax::new(Quota::Unlimited, Duration::from_micros(100_000));
        assert_eq!(pair.bandwidth(), None);
        assert_eq!(pair.to_string(), "max 100000");
    }

    #[test]
    fn test_cpu_stats_throttle_percentage() {
        let stats = CpuStats {
            nr_periods: 1000,
            nr_throttled: 100,
            ..Default::default()
        };

        assert_eq!(stats.throttle_percentage(), 10.0);
        assert!(stats.is_throttled());

        let stats = CpuStats::default();
        assert_eq!(stats.throttle_percentage(), 0.0);
        assert!(!stats.is_throttled());
    }
}
