//! cpulimit Daemon
//!
//! Command-line front end for cpulimit: applies CPU limits to a cgroup and
//! reports its usage and throttling.

pub mod config;
pub mod sampler;

pub use config::Config;
pub use sampler::{Sample, SamplerStats, ThrottleSampler};
