use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub warmup: Option<WarmupConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject degenerate parameters. Must pass before anything is spawned.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.target.url.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let load = &self.load;
        if !load.target_rps.is_finite() || load.target_rps <= 0.0 {
            return Err(ConfigError::InvalidTargetRps(load.target_rps));
        }
        if load.duration_ms == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if load.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if load.max_vus == 0 {
            return Err(ConfigError::ZeroMaxVus);
        }
        if load.initial_vus == 0 {
            return Err(ConfigError::ZeroInitialVus);
        }
        match load.step {
            StepPolicy::Fixed { size: 0 } | StepPolicy::Proportional { max_step: 0 } => {
                return Err(ConfigError::ZeroStep);
            }
            _ => {}
        }

        if let Some(warmup) = &self.warmup {
            if warmup.samples == 0 {
                return Err(ConfigError::ZeroWarmupSamples);
            }
        }

        let sim = &self.simulation;
        if sim.min_delay_ms > sim.max_delay_ms {
            return Err(ConfigError::DelayRange {
                min: sim.min_delay_ms,
                max: sim.max_delay_ms,
            });
        }
        if !(0.0..=1.0).contains(&sim.success_ratio) {
            return Err(ConfigError::InvalidSuccessRatio(sim.success_ratio));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Endpoint every virtual user hits
    pub url: String,
    /// Per-request timeout in milliseconds (http mode only)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Requests per second the controller converges on
    pub target_rps: f64,
    /// Total run length in milliseconds
    pub duration_ms: u64,
    /// Upper bound on concurrently active virtual users
    pub max_vus: usize,
    /// Controller tick period in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Starting pool size when no warm-up is configured
    #[serde(default = "default_initial_vus")]
    pub initial_vus: usize,
    #[serde(default)]
    pub step: StepPolicy,
    /// Grace period for in-flight requests at shutdown
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl LoadConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// How many virtual users a single controller decision adds or removes.
///
/// Larger steps converge faster but oscillate more around the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StepPolicy {
    Fixed { size: usize },
    /// Sized from the current per-VU throughput, capped at `max_step`
    Proportional { max_step: usize },
}

impl Default for StepPolicy {
    fn default() -> Self {
        StepPolicy::Fixed { size: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    /// Number of sequential probe requests
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_success_ratio")]
    pub success_ratio: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            success_ratio: default_success_ratio(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_initial_vus() -> usize {
    1
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_min_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    100
}

fn default_success_ratio() -> f64 {
    0.9
}
