use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use cpulimit_core::{Bandwidth, CfsController, CfsError, CgroupV2Controller, VERSION};
use cpulimit_daemon::config::LogConfig;
use cpulimit_daemon::{Config, ThrottleSampler};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cpulimit - CFS bandwidth control for cgroup v2
///
/// Applies CPU limits to a cgroup and reports its usage and throttling
#[derive(Parser, Debug)]
#[command(name = "cpulimit")]
#[command(version = VERSION)]
#[command(about = "cpulimit - CFS bandwidth control for cgroup v2", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/cpulimit/config.toml")]
    config: PathBuf,

    /// Cgroup directory, overrides the configured one
    #[arg(short = 'g', long, env = "CPULIMIT_CGROUP")]
    cgroup: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show accumulated CPU time
    Usage,

    /// Show number of throttled CFS periods
    Throttled,

    /// Show current limit and CPU statistics
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a CPU limit ("500m", "0.5", "2"); defaults to the configured limit
    Set { bandwidth: Option<Bandwidth> },

    /// Continuously sample usage and throttling
    Watch,

    /// Generate default configuration file
    GenerateConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let mut config = load_config(&cli.config)?;
    if let Some(cgroup) = cli.cgroup {
        config.cgroup.path = cgroup;
    }

    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

    let _guard = init_logging(&config.logging)?;

    info!("cpulimit v{} starting...", VERSION);
    if config_found {
        info!("Configuration loaded from: {:?}", cli.config);
    } else {
        warn!("Configuration file not found: {:?}, using defaults", cli.config);
    }

    let controller = CgroupV2Controller::new(&config.cgroup.path);

    match cli.command {
        Commands::Usage => show_usage(&controller)?,
        Commands::Throttled => show_throttled(&controller)?,
        Commands::Show { json } => show_status(&controller, json)?,
        Commands::Set { bandwidth } => run_set(&controller, bandwidth.or(config.cgroup.limit))?,
        Commands::Watch => run_watch_loop(controller, &config).await?,
        Commands::GenerateConfig { output } => generate_config(&output)?,
    }

    Ok(())
}

fn show_usage(controller: &CgroupV2Controller) -> Result<()> {
    let usage = controller.usage()?;
    println!(
        "{} {} ({} usec)",
        "CPU usage:".cyan(),
        usage,
        usage.as_micros()
    );
    Ok(())
}

fn show_throttled(controller: &CgroupV2Controller) -> Result<()> {
    let throttled = controller.nr_throttled()?;
    let line = format!("Throttled periods: {}", throttled);
    if throttled > 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
    Ok(())
}

/// Display the limit and statistics of the cgroup
fn show_status(controller: &CgroupV2Controller, json: bool) -> Result<()> {
    let cpu_max = controller.limit()?;
    let stats = controller.stats()?;

    if json {
        let report = serde_json::json!({
            "cgroup": controller.path().display().to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "cpu_max": {
                "quota_usec": cpu_max.quota.as_duration().map(|quota| quota.as_micros() as u64),
                "period_usec": cpu_max.period.as_micros() as u64,
                "bandwidth": cpu_max.bandwidth(),
            },
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "=== cpulimit Status ===".green().bold());
    println!("  Cgroup:     {}", controller.path().display());
    match cpu_max.bandwidth() {
        Some(bandwidth) => println!(
            "  Limit:      {} ({:.3} cores)",
            bandwidth,
            bandwidth.cores()
        ),
        None => println!("  Limit:      {}", "unlimited".green()),
    }
    println!("  cpu.max:    {}", cpu_max);
    println!(
        "  Usage:      {}",
        humantime::format_duration(Duration::from_micros(stats.usage_usec))
    );
    println!("  User:       {} usec", stats.user_usec);
    println!("  System:     {} usec", stats.system_usec);

    let throttled = format!(
        "{} of {} periods ({:.1}%)",
        stats.nr_throttled,
        stats.nr_periods,
        stats.throttle_percentage()
    );
    if stats.is_throttled() {
        println!("  Throttled:  {}", throttled.yellow());
    } else {
        println!("  Throttled:  {}", throttled);
    }
    Ok(())
}

/// Apply a limit, explaining a rejected write
fn run_set(controller: &CgroupV2Controller, bandwidth: Option<Bandwidth>) -> Result<()> {
    let limit = bandwidth
        .ok_or_else(|| anyhow!("No bandwidth given and no limit configured in [cgroup]"))?;

    match controller.set_limit(limit) {
        Ok(true) => {
            println!("{}", format!("Limit set to {}", limit).green());
            Ok(())
        }
        Ok(false) => {
            println!("Limit already at {}, nothing to do", limit);
            Ok(())
        }
        Err(e) => {
            if let CfsError::LimitRejected {
                quota,
                period,
                parent_quota,
                ..
            } = &e
            {
                eprintln!("{}", "Kernel rejected the new quota".red().bold());
                eprintln!("  Attempted quota: {} usec", quota.as_micros());
                eprintln!("  Period:          {} usec", period.as_micros());
                eprintln!("  Parent quota:    {}", parent_quota);
            }
            error!("Failed to set limit {}: {}", limit, e);
            Err(e.into())
        }
    }
}

/// Run continuous sampling loop until Ctrl+C
async fn run_watch_loop(controller: CgroupV2Controller, config: &Config) -> Result<()> {
    info!(
        "Sampling {:?} every {}s",
        controller.path(),
        config.sampling.interval_secs
    );

    let mut sampler = ThrottleSampler::new(controller, config.sampling.throttle_warn_ratio);
    let mut ticker = tokio::time::interval(Duration::from_secs(config.sampling.interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sampler.sample() {
                    error!("Sampling failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    let stats = sampler.stats();
    info!(
        "Stats: samples={}, throttled samples={}, throttled periods={}",
        stats.total_samples, stats.throttled_samples, stats.total_throttled_periods
    );
    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &Path) -> Result<()> {
    info!("Generating default configuration file: {:?}", output);

    Config::default()
        .save_to_file(output)
        .map_err(|e| anyhow!("Failed to save configuration file: {}", e))?;

    info!("Configuration file generated successfully");
    Ok(())
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from_file(path)
            .map_err(|e| anyhow!("Failed to load configuration file: {}", e))
    } else {
        Ok(Config::default())
    }
}

/// Initialize logging with stderr and file output
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(logging: &LogConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&logging.log_dir, &logging.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level)),
        )
        .init();

    Ok(guard)
}
