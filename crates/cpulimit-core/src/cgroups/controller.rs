//! CFS bandwidth controller for cgroup v2

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{CfsError, Result};
use super::types::{CpuMax, CpuStats, Quota};
use super::utils::{
    flat_keyed_value, format_quota, parse_cpu_max, parse_cpu_stat, read_cgroup_file,
    write_cgroup_file,
};
use crate::types::{Bandwidth, CpuTime};

const CPU_MAX: &str = "cpu.max";
const CPU_STAT: &str = "cpu.stat";

/// CPU bandwidth control over a single cgroup
///
/// Implementations re-read kernel state on every call; nothing is cached
/// between calls.
pub trait CfsController {
    /// Accumulated CPU time of the cgroup
    fn usage(&self) -> Result<CpuTime>;

    /// Apply a CPU limit, returning whether the quota was changed
    fn set_limit(&self, limit: Bandwidth) -> Result<bool>;

    /// Number of CFS periods the cgroup was throttled in
    fn nr_throttled(&self) -> Result<u64>;

    /// Number of CFS periods the cgroup had runnable tasks in
    fn nr_periods(&self) -> Result<u64>;
}

/// CFS controller bound to a cgroup v2 directory
///
/// # Examples
/// ```no_run
/// use cpulimit_core::{Bandwidth, CfsController, CgroupV2Controller};
///
/// let cgroup = CgroupV2Controller::new("/sys/fs/cgroup/workspaces/ws-1");
/// let changed = cgroup.set_limit(Bandwidth::from_millicores(1500))?;
/// println!("changed: {changed}, usage: {}", cgroup.usage()?);
/// # Ok::<(), cpulimit_core::CfsError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CgroupV2Controller {
    path: PathBuf,
}

impl CgroupV2Controller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cgroup directory this controller is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Controller for the immediately containing directory
    ///
    /// A bare relative name is contained in `"."`; the filesystem root has
    /// no parent.
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|parent| {
            if parent.as_os_str().is_empty() {
                Self::new(".")
            } else {
                Self::new(parent)
            }
        })
    }

    /// Current quota/period pair
    pub fn limit(&self) -> Result<CpuMax> {
        self.read_cpu_max()
    }

    /// Full `cpu.stat` snapshot
    pub fn stats(&self) -> Result<CpuStats> {
        let path = self.path.join(CPU_STAT);
        let content = read_cgroup_file(&path)?;
        parse_cpu_stat(&path, &content)
    }

    fn read_cpu_max(&self) -> Result<CpuMax> {
        let path = self.path.join(CPU_MAX);
        let content = read_cgroup_file(&path)?;
        let cpu_max = parse_cpu_max(&path, &content)?;
        debug!("Read {:?}: {}", path, cpu_max);
        Ok(cpu_max)
    }

    fn write_quota(&self, quota: Duration) -> io::Result<()> {
        write_cgroup_file(&self.path.join(CPU_MAX), &format_quota(quota))
    }

    /// Best-effort parent quota for diagnostics
    fn read_parent_quota(&self) -> Quota {
        let Some(parent) = self.parent() else {
            return Quota::Unlimited;
        };

        match parent.read_cpu_max() {
            Ok(cpu_max) => cpu_max.quota,
            Err(e) => {
                warn!("Cannot read parent quota of {:?}: {}", self.path, e);
                Quota::Unlimited
            }
        }
    }

    fn flat_keyed_value(&self, key: &str) -> Result<u64> {
        let path = self.path.join(CPU_STAT);
        let content = read_cgroup_file(&path)?;
        flat_keyed_value(&path, &content, key)
    }
}

impl CfsController for CgroupV2Controller {
    fn usage(&self) -> Result<CpuTime> {
        let usage = self.flat_keyed_value("usage_usec")?;
        Ok(CpuTime::from_micros(usage))
    }

    fn set_limit(&self, limit: Bandwidth) -> Result<bool> {
        let current = self.read_cpu_max()?;
        let target = limit.quota(current.period);
        if current.quota == Quota::Limited(target) {
            debug!("Quota of {:?} already at {}", self.path, current.quota);
            return Ok(false);
        }

        if let Err(source) = self.write_quota(target) {
            return Err(CfsError::LimitRejected {
                path: self.path.join(CPU_MAX),
                quota: target,
                period: current.period,
                parent_quota: self.read_parent_quota(),
                source,
            });
        }

        info!(
            "Set CFS quota of {:?} to {} ({}, period {}, was {})",
            self.path,
            format_quota(target),
            limit,
            current.period.as_micros(),
            current.quota
        );
        Ok(true)
    }

    fn nr_throttled(&self) -> Result<u64> {
        self.flat_keyed_value("nr_throttled")
    }

    fn nr_periods(&self) -> Result<u64> {
        self.flat_keyed_value("nr_periods")
    }
}
