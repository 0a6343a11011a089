use cpulimit_core::Bandwidth;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the cpulimit daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target cgroup configuration
    pub cgroup: CgroupConfig,

    /// Logging configuration
    pub logging: LogConfig,

    /// Usage sampling settings (watch mode)
    pub sampling: SamplingConfig,
}

/// Target cgroup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CgroupConfig {
    /// Cgroup v2 directory to control (default: /sys/fs/cgroup)
    pub path: PathBuf,

    /// Limit applied by `set` when no bandwidth is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Bandwidth>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log directory path (default: ./logs/)
    pub log_dir: PathBuf,

    /// Log file name prefix, rotated daily (default: cpulimit.log)
    pub log_file: String,

    /// Default filter when RUST_LOG is not set (default: info)
    pub level: String,
}

/// Usage sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sampling interval in seconds (default: 5)
    pub interval_secs: u64,

    /// Fraction of throttled periods per interval, 0.0 to 1.0, that
    /// triggers a warning (default: 0.5)
    pub throttle_warn_ratio: f64,
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/sys/fs/cgroup"),
            limit: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file: "cpulimit.log".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            throttle_warn_ratio: 0.5,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Example
    /// ```no_run
    /// use cpulimit_daemon::config::Config;
    ///
    /// let config = Config::load_from_file("/etc/cpulimit/config.toml").unwrap();
    /// println!("Cgroup: {:?}", config.cgroup.path);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.cgroup.path.as_os_str().is_empty() {
            return Err("Cgroup path must not be empty".to_string());
        }

        if self.sampling.interval_secs == 0 {
            return Err("Sampling interval must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.sampling.throttle_warn_ratio) {
            return Err("Throttle warn ratio must be between 0.0 and 1.0".to_string());
        }

        if self.logging.log_file.is_empty() {
            return Err("Log file name must not be empty".to_string());
        }

        if self.logging.level.is_empty() {
            return Err("Log level must not be empty".to_string());
        }

        Ok(())
    }
}
