use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// CPU rate limit in millicores (1000 = one full core)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bandwidth(u64);

impl Bandwidth {
    pub const fn from_millicores(millicores: u64) -> Self {
        Self(millicores)
    }

    /// Fractional cores, rounded to the nearest millicore
    ///
    /// Negative and non-finite values clamp to zero.
    pub fn from_cores(cores: f64) -> Self {
        if !cores.is_finite() || cores <= 0.0 {
            return Self(0);
        }
        Self((cores * 1000.0).round() as u64)
    }

    pub const fn millicores(self) -> u64 {
        self.0
    }

    pub fn cores(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// CFS quota granting this bandwidth over `period`
    ///
    /// Truncated to whole microseconds, the resolution of `cpu.max`.
    pub fn quota(self, period: Duration) -> Duration {
        let micros = period
            .as_micros()
            .checked_mul(u128::from(self.0))
            .map_or(u64::MAX, |micros| saturate(micros / 1000));
        Duration::from_micros(micros)
    }

    /// Bandwidth granted by `quota` per `period`
    pub fn from_quota(quota: Duration, period: Duration) -> Self {
        if period.is_zero() {
            return Self(0);
        }
        let millicores = quota
            .as_nanos()
            .checked_mul(1000)
            .map_or(u64::MAX, |nanos| saturate(nanos / period.as_nanos()));
        Self(millicores)
    }

    /// CPU time this bandwidth permits over `dt`
    pub fn integrate(self, dt: Duration) -> CpuTime {
        let nanos = dt
            .as_nanos()
            .checked_mul(u128::from(self.0))
            .map_or(u64::MAX, |nanos| saturate(nanos / 1000));
        CpuTime(Duration::from_nanos(nanos))
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl FromStr for Bandwidth {
    type Err = Error;

    /// Accepts millicores (`"1500m"`) or cores (`"1.5"`, `"2"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::InvalidBandwidth(s.to_string());

        if let Some(millicores) = s.strip_suffix('m') {
            return millicores.parse::<u64>().map(Self).map_err(|_| invalid());
        }

        let cores: f64 = s.parse().map_err(|_| invalid())?;
        if !cores.is_finite() || cores < 0.0 {
            return Err(invalid());
        }
        Ok(Self::from_cores(cores))
    }
}

impl TryFrom<String> for Bandwidth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bandwidth> for String {
    fn from(bandwidth: Bandwidth) -> Self {
        bandwidth.to_string()
    }
}

/// Accumulated CPU time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuTime(Duration);

impl CpuTime {
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Duration::from_micros(micros))
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_micros(self) -> u128 {
        self.0.as_micros()
    }

    /// Average bandwidth consumed if this much CPU time was used over `dt`
    pub fn effective_bandwidth(self, dt: Duration) -> Bandwidth {
        Bandwidth::from_quota(self.0, dt)
    }
}

impl Sub for CpuTime {
    type Output = CpuTime;

    /// Saturates at zero, e.g. across a cgroup being recreated
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for CpuTime {
    type Output = CpuTime;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl From<Duration> for CpuTime {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for CpuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(100);

    #[test]
    fn test_quota_for_period() {
        assert_eq!(Bandwidth::from_millicores(500).quota(PERIOD), Duration::from_millis(50));
        assert_eq!(Bandwidth::from_millicores(800).quota(PERIOD), Duration::from_millis(80));
        assert_eq!(Bandwidth::from_millicores(2000).quota(PERIOD), Duration::from_millis(200));
        assert_eq!(Bandwidth::from_millicores(0).quota(PERIOD), Duration::ZERO);
    }

    #[test]
    fn test_quota_truncates_to_microseconds() {
        // 1m over 1.5ms is 1.5us
        let quota = Bandwidth::from_millicores(1).quota(Duration::from_micros(1500));
        assert_eq!(quota, Duration::from_micros(1));
    }

    #[test]
    fn test_quota_is_monotonic() {
        let mut last = Duration::ZERO;
        for millicores in (0..=4000).step_by(7) {
            let quota = Bandwidth::from_millicores(millicores).quota(Duration::from_micros(33_333));
            assert!(quota >= last);
            last = quota;
        }
    }

    #[test]
    fn test_from_cores() {
        assert_eq!(Bandwidth::from_cores(0.5), Bandwidth::from_millicores(500));
        assert_eq!(Bandwidth::from_cores(2.75), Bandwidth::from_millicores(2750));
        assert_eq!(Bandwidth::from_cores(-1.0), Bandwidth::from_millicores(0));
        assert_eq!(Bandwidth::from_cores(f64::NAN), Bandwidth::from_millicores(0));
        assert_eq!(Bandwidth::from_millicores(1500).cores(), 1.5);
    }

    #[test]
    fn test_from_quota() {
        assert_eq!(
            Bandwidth::from_quota(Duration::from_millis(50), PERIOD),
            Bandwidth::from_millicores(500)
        );
        assert_eq!(
            Bandwidth::from_quota(Duration::from_millis(50), Duration::ZERO),
            Bandwidth::from_millicores(0)
        );
    }

    #[test]
    fn test_extreme_inputs_saturate() {
        let huge = Bandwidth::from_millicores(u64::MAX);
        assert_eq!(huge.quota(Duration::MAX), Duration::from_micros(u64::MAX));
        assert_eq!(huge.integrate(Duration::MAX).as_duration(), Duration::from_nanos(u64::MAX));
        assert_eq!(
            Bandwidth::from_quota(Duration::MAX, Duration::from_nanos(1)),
            Bandwidth::from_millicores(u64::MAX)
        );
    }

    #[test]
    fn test_integrate() {
        let cpu = Bandwidth::from_millicores(250).integrate(Duration::from_secs(4));
        assert_eq!(cpu.as_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_bandwidth() {
        assert_eq!("1500m".parse::<Bandwidth>().unwrap(), Bandwidth::from_millicores(1500));
        assert_eq!("0.8".parse::<Bandwidth>().unwrap(), Bandwidth::from_millicores(800));
        assert_eq!("2".parse::<Bandwidth>().unwrap(), Bandwidth::from_millicores(2000));
        assert_eq!(" 250m ".parse::<Bandwidth>().unwrap(), Bandwidth::from_millicores(250));

        assert!("".parse::<Bandwidth>().is_err());
        assert!("-1".parse::<Bandwidth>().is_err());
        assert!("1.5m".parse::<Bandwidth>().is_err());
        assert!("inf".parse::<Bandwidth>().is_err());
        assert!("lots".parse::<Bandwidth>().is_err());
    }

    #[test]
    fn test_bandwidth_serde() {
        let json = serde_json::to_string(&Bandwidth::from_millicores(750)).unwrap();
        assert_eq!(json, "\"750m\"");

        let parsed: Bandwidth = serde_json::from_str("\"1.5\"").unwrap();
        assert_eq!(parsed, Bandwidth::from_millicores(1500));

        assert!(serde_json::from_str::<Bandwidth>("\"fast\"").is_err());
    }

    #[test]
    fn test_cpu_time_arithmetic() {
        let earlier = CpuTime::from_micros(1_000_000);
        let later = CpuTime::from_micros(1_500_000);

        assert_eq!((later - earlier).as_duration(), Duration::from_millis(500));
        assert_eq!(earlier - later, CpuTime::default());
        assert_eq!((earlier + later).as_micros(), 2_500_000);
    }

    #[test]
    fn test_effective_bandwidth() {
        let used = CpuTime::new(Duration::from_secs(3));
        assert_eq!(
            used.effective_bandwidth(Duration::from_secs(2)),
            Bandwidth::from_millicores(1500)
        );
    }

    #[test]
    fn test_cpu_time_display() {
        assert_eq!(CpuTime::from_micros(1_500_000).to_string(), "1s 500ms");
    }
}
