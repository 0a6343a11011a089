//! cpulimit Core Library
//!
//! CFS bandwidth control for cgroup v2: turns a CPU rate into the
//! quota/period pair the scheduler enforces and reports usage and
//! throttling back to the caller.

pub mod cgroups;
pub mod error;
pub mod types;

pub use cgroups::{CfsController, CfsError, CgroupV2Controller, CpuMax, CpuStats, Quota};
pub use error::{Error, Result};
pub use types::{Bandwidth, CpuTime};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
