use thiserror::Error;

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid run parameters, detected before any virtual user is spawned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("target.url must not be empty")]
    EmptyEndpoint,

    #[error("load.target_rps must be a positive finite number, got {0}")]
    InvalidTargetRps(f64),

    #[error("load.duration_ms must be greater than zero")]
    ZeroDuration,

    #[error("load.interval_ms must be greater than zero")]
    ZeroInterval,

    #[error("load.max_vus must be at least 1")]
    ZeroMaxVus,

    #[error("load.initial_vus must be at least 1")]
    ZeroInitialVus,

    #[error("load.step size must be at least 1")]
    ZeroStep,

    #[error("warmup.samples must be at least 1")]
    ZeroWarmupSamples,

    #[error("simulation.min_delay_ms ({min}) exceeds simulation.max_delay_ms ({max})")]
    DelayRange { min: u64, max: u64 },

    #[error("simulation.success_ratio must be within [0, 1], got {0}")]
    InvalidSuccessRatio(f64),
}
