use cpulimit_core::{Bandwidth, CfsController, CfsError, CpuTime};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One usage/throttling reading
#[derive(Debug, Clone, Copy)]
struct Reading {
    at: Instant,
    usage: CpuTime,
    nr_periods: u64,
    nr_throttled: u64,
}

/// Consumption over one sampling interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Wall-clock length of the interval
    pub interval: Duration,

    /// CPU time consumed during the interval
    pub usage: CpuTime,

    /// Enforcement periods elapsed during the interval
    pub periods: u64,

    /// Periods throttled during the interval
    pub throttled: u64,

    /// Average bandwidth consumed during the interval
    pub effective: Bandwidth,
}

impl Sample {
    /// Fraction of the interval's periods that were throttled, 0.0 to 1.0
    ///
    /// An interval without any elapsed period counts as unthrottled.
    pub fn throttle_ratio(&self) -> f64 {
        if self.periods == 0 {
            return 0.0;
        }
        (self.throttled as f64 / self.periods as f64).min(1.0)
    }
}

/// Running totals across samples
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerStats {
    pub total_samples: u64,
    pub throttled_samples: u64,
    pub total_throttled_periods: u64,
}

/// Samples usage and throttling of a cgroup
///
/// Turns the monotonic counters of a [`CfsController`] into per-interval
/// deltas. It only observes; limits are applied elsewhere.
pub struct ThrottleSampler<C> {
    controller: C,
    last: Option<Reading>,
    stats: SamplerStats,
    throttle_warn_ratio: f64,
}

impl<C: CfsController> ThrottleSampler<C> {
    /// Create new sampler
    ///
    /// # Arguments
    /// * `controller` - Controller of the sampled cgroup
    /// * `throttle_warn_ratio` - Throttle ratio per interval at or above which a warning is logged
    pub fn new(controller: C, throttle_warn_ratio: f64) -> Self {
        Self {
            controller,
            last: None,
            stats: SamplerStats::default(),
            throttle_warn_ratio,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn stats(&self) -> &SamplerStats {
        &self.stats
    }

    /// Take a reading now
    ///
    /// The first call only primes the sampler and returns `None`.
    pub fn sample(&mut self) -> Result<Option<Sample>, CfsError> {
        self.sample_at(Instant::now())
    }

    /// Take a reading attributed to `at`
    pub fn sample_at(&mut self, at: Instant) -> Result<Option<Sample>, CfsError> {
        let reading = Reading {
            at,
            usage: self.controller.usage()?,
            nr_periods: self.controller.nr_periods()?,
            nr_throttled: self.controller.nr_throttled()?,
        };

        let Some(last) = self.last.replace(reading) else {
            debug!("Sampler primed at usage {}", reading.usage);
            return Ok(None);
        };

        let interval = reading.at.saturating_duration_since(last.at);
        let usage = reading.usage - last.usage;
        let sample = Sample {
            interval,
            usage,
            periods: reading.nr_periods.saturating_sub(last.nr_periods),
            throttled: reading.nr_throttled.saturating_sub(last.nr_throttled),
            effective: usage.effective_bandwidth(interval),
        };

        self.record(&sample);
        Ok(Some(sample))
    }

    fn record(&mut self, sample: &Sample) {
        self.stats.total_samples += 1;
        self.stats.total_throttled_periods += sample.throttled;
        if sample.throttled > 0 {
            self.stats.throttled_samples += 1;
        }

        let ratio = sample.throttle_ratio();
        if sample.throttled > 0 && ratio >= self.throttle_warn_ratio {
            warn!(
                "Throttled in {} of {} periods ({:.1}%) over {} (using {})",
                sample.throttled,
                sample.periods,
                ratio * 100.0,
                humantime::format_duration(sample.interval),
                sample.effective
            );
        } else {
            info!(
                "Used {} over {} ({}), throttle ratio {:.3} ({} of {} periods)",
                sample.usage,
                humantime::format_duration(sample.interval),
                sample.effective,
                ratio,
                sample.throttled,
                sample.periods
            );
        }
    }
}
