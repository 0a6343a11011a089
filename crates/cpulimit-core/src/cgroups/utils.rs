//! Utility functions for cgroup control files

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use super::error::{CfsError, Result};
use super::types::{CpuMax, CpuStats, Quota, UNLIMITED_TOKEN};

/// Parse an unsigned base-10 field, attributing failures to `field`
///
/// Only ASCII digits are accepted; a sign is rejected.
fn parse_u64(path: &Path, field: &str, value: &str) -> Result<u64> {
    let invalid = |source| CfsError::Parse {
        path: path.to_path_buf(),
        field: field.to_string(),
        value: value.to_string(),
        source,
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(None));
    }
    value.parse::<u64>().map_err(|e| invalid(Some(e)))
}

/// Look up a single value in a flat-keyed file
///
/// Format:
/// ```text
/// usage_usec 1234567890
/// nr_throttled 100
/// ```
///
/// Lines are scanned in file order and the first line whose first field is
/// exactly `key` wins, so `nr_throttled` never picks up `nr_throttled_usec`.
/// A matching line without a value field fails to parse.
pub fn flat_keyed_value(path: &Path, content: &str, key: &str) -> Result<u64> {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(key) {
            continue;
        }

        let value = fields.next().unwrap_or_default();
        return parse_u64(path, key, value);
    }

    Err(CfsError::KeyNotFound {
        path: path.to_path_buf(),
        key: key.to_string(),
    })
}

/// Parse CPU stat file
///
/// Format:
/// ```text
/// usage_usec 1234567890
/// user_usec 1000000
/// system_usec 234567890
/// nr_periods 1000
/// nr_throttled 100
/// throttled_usec 50000000
/// ```
///
/// `usage_usec` is mandatory; the bandwidth counters default to zero when
/// the cpu controller is not enabled for the cgroup.
pub fn parse_cpu_stat(path: &Path, content: &str) -> Result<CpuStats> {
    let optional = |key: &str| match flat_keyed_value(path, content, key) {
        Err(CfsError::KeyNotFound { .. }) => Ok(0),
        other => other,
    };

    Ok(CpuStats {
        usage_usec: flat_keyed_value(path, content, "usage_usec")?,
        user_usec: optional("user_usec")?,
        system_usec: optional("system_usec")?,
        nr_periods: optional("nr_periods")?,
        nr_throttled: optional("nr_throttled")?,
        throttled_usec: optional("throttled_usec")?,
    })
}

/// Parse CPU max file
///
/// Format: `"<quota> <period>"` in microseconds, where quota may be `max`.
pub fn parse_cpu_max(path: &Path, content: &str) -> Result<CpuMax> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(CfsError::Format {
            path: path.to_path_buf(),
            content: content.trim().to_string(),
        });
    }

    let quota = if parts[0] == UNLIMITED_TOKEN {
        Quota::Unlimited
    } else {
        Quota::from_micros(parse_u64(path, "quota", parts[0])?)
    };
    let period = Duration::from_micros(parse_u64(path, "period", parts[1])?);

    Ok(CpuMax::new(quota, period))
}

/// Serialize a quota the way `cpu.max` accepts it on its own
///
/// The period is left out so the kernel keeps whatever is in effect.
pub fn format_quota(quota: Duration) -> String {
    quota.as_micros().to_string()
}

/// Safe read file to string
pub fn read_cgroup_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CfsError::io(path, e))
}

/// Write a control file
///
/// Returns the raw IO error so callers can attach their own context.
pub fn write_cgroup_file(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)
}
