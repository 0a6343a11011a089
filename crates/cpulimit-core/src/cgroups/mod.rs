//! Cgroup v2 CFS bandwidth control
//!
//! Reads and enforces CPU limits through a cgroup's `cpu.max` and reports
//! consumption from its `cpu.stat`.
//!
//! # Hierarchy
//! A child's quota can never exceed its parent's. The kernel rejects such
//! writes, and the resulting error carries the parent's quota.

pub mod controller;
pub mod error;
pub mod types;
mod utils;

pub use controller::{CfsController, CgroupV2Controller};
pub use error::{CfsError, Result};
pub use types::{CpuMax, CpuStats, Quota};
