use crate::config::SimulationConfig;
use anyhow::Result;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Result of a single request. Failure is an ordinary value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    /// `None` when the request never got far enough to be timed
    pub latency: Option<Duration>,
}

impl Outcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            success: true,
            latency: Some(latency),
        }
    }

    pub fn failure(latency: Option<Duration>) -> Self {
        Self {
            success: false,
            latency,
        }
    }
}

/// Trait for request drivers that virtual users call in a loop
pub trait RequestExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>>;
}

/// Stand-in for a real target: random delay, random outcome.
pub struct SimulatedExecutor {
    min_delay_ms: u64,
    max_delay_ms: u64,
    success_ratio: f64,
}

impl SimulatedExecutor {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, success_ratio: f64) -> Self {
        Self {
            min_delay_ms: min_delay_ms.min(max_delay_ms),
            max_delay_ms,
            success_ratio: success_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.min_delay_ms,
            config.max_delay_ms,
            config.success_ratio,
        )
    }
}

impl RequestExecutor for SimulatedExecutor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn execute<'a>(
        &'a self,
        _endpoint: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>> {
        // Roll before awaiting; the thread rng must not live across the sleep.
        let delay_ms = rand::random_range(self.min_delay_ms..=self.max_delay_ms);
        let success = rand::random_bool(self.success_ratio);

        Box::pin(async move {
            let start = Instant::now();
            sleep(Duration::from_millis(delay_ms)).await;
            let latency = start.elapsed();

            if success {
                Outcome::success(latency)
            } else {
                Outcome::failure(Some(latency))
            }
        })
    }
}

/// Deterministic executor: constant latency, constant outcome.
pub struct FixedExecutor {
    latency: Duration,
    success: bool,
}

impl FixedExecutor {
    pub fn new(latency: Duration, success: bool) -> Self {
        Self { latency, success }
    }

    pub fn succeeding(latency: Duration) -> Self {
        Self::new(latency, true)
    }

    pub fn failing(latency: Duration) -> Self {
        Self::new(latency, false)
    }
}

impl RequestExecutor for FixedExecutor {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn execute<'a>(
        &'a self,
        _endpoint: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>> {
        Box::pin(async move {
            sleep(self.latency).await;

            Outcome {
                success: self.success,
                latency: Some(self.latency),
            }
        })
    }
}

/// Plain HTTP GET driver. 2xx with a readable body is a success.
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self { client })
    }
}

impl RequestExecutor for HttpExecutor {
    fn name(&self) -> &'static str {
        "http"
    }

    fn execute<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();

            match self.client.get(endpoint).send().await {
                Ok(response) => {
                    let status = response.status();
                    // Read the body so latency covers the full response
                    let body = response.bytes().await;
                    let latency = start.elapsed();

                    if status.is_success() && body.is_ok() {
                        Outcome::success(latency)
                    } else {
                        debug!("Request to {} failed with status {}", endpoint, status);
                        Outcome::failure(Some(latency))
                    }
                }
                Err(e) if e.is_builder() => {
                    debug!("Request to {} could not be built: {}", endpoint, e);
                    Outcome::failure(None)
                }
                Err(e) => {
                    debug!("Request to {} failed: {}", endpoint, e);
                    Outcome::failure(Some(start.elapsed()))
                }
            }
        })
    }
}
