use crate::executor::RequestExecutor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Result of the pre-run probe burst.
///
/// Probe outcomes are tallied here only; they never reach the run counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupEstimate {
    pub probes: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Mean over every probe that reported a latency, failures included
    pub mean_latency_ms: Option<f64>,
    pub initial_vus: usize,
}

/// Sizes the starting pool from measured latency.
///
/// One VU issuing sequential requests manages about `1 / latency` RPS, so the
/// target needs roughly `target_rps * latency` of them. The controller
/// corrects whatever this gets wrong.
#[derive(Debug, Clone)]
pub struct WarmupEstimator {
    samples: usize,
}

impl WarmupEstimator {
    pub fn new(samples: usize) -> Self {
        Self {
            samples: samples.max(1),
        }
    }

    pub async fn estimate(
        &self,
        executor: &dyn RequestExecutor,
        endpoint: &str,
        target_rps: f64,
        max_vus: usize,
    ) -> WarmupEstimate {
        info!("Sampling response times with {} probes...", self.samples);

        let mut latencies = Vec::with_capacity(self.samples);
        let mut succeeded = 0;
        let mut failed = 0;

        for _ in 0..self.samples {
            let outcome = executor.execute(endpoint).await;
            if outcome.success {
                succeeded += 1;
            } else {
                failed += 1;
            }
            if let Some(latency) = outcome.latency {
                latencies.push(latency);
            }
        }

        let mean = mean_latency(&latencies);
        let initial_vus = initial_vus(target_rps, mean, max_vus);

        match mean {
            Some(mean) => info!(
                "Average response time from sampling: {:.1}ms -> {} VUs",
                as_millis_f64(mean),
                initial_vus
            ),
            None => info!("No probe latency available, starting with {} VU", initial_vus),
        }

        WarmupEstimate {
            probes: self.samples,
            succeeded,
            failed,
            mean_latency_ms: mean.map(as_millis_f64),
            initial_vus,
        }
    }
}

fn as_millis_f64(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

pub fn mean_latency(latencies: &[Duration]) -> Option<Duration> {
    if latencies.is_empty() {
        return None;
    }
    let total: Duration = latencies.iter().sum();
    let count = u32::try_from(latencies.len()).unwrap_or(u32::MAX);
    Some(total / count)
}

/// `ceil(target_rps * mean_seconds)` clamped to `[1, max_vus]`; 1 without a mean.
pub fn initial_vus(target_rps: f64, mean: Option<Duration>, max_vus: usize) -> usize {
    let max_vus = max_vus.max(1);
    let Some(mean) = mean else {
        return 1;
    };

    // Shave float noise so an exact product such as 5.0000000001 stays 5
    let wanted = (target_rps * mean.as_secs_f64() - 1e-9).ceil();
    if !wanted.is_finite() || wanted < 1.0 {
        return 1;
    }
    (wanted as usize).clamp(1, max_vus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{FixedExecutor, Outcome};
    use std::pin::Pin;

    #[test]
    fn test_initial_vus_formula() {
        let ms = Duration::from_millis;
        assert_eq!(initial_vus(50.0, Some(ms(100)), 100), 5);
        assert_eq!(initial_vus(50.0, Some(ms(100)), 3), 3);
        assert_eq!(initial_vus(800.0, Some(ms(75)), 100), 60);
        assert_eq!(initial_vus(20.0, Some(ms(51)), 10), 2);
        assert_eq!(initial_vus(1.0, Some(ms(1)), 10), 1);
        assert_eq!(initial_vus(50.0, Some(Duration::ZERO), 10), 1);
        assert_eq!(initial_vus(50.0, None, 10), 1);
    }

    #[test]
    fn test_mean_latency() {
        let ms = Duration::from_millis;
        assert_eq!(mean_latency(&[]), None);
        assert_eq!(mean_latency(&[ms(50), ms(100), ms(150)]), Some(ms(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimate_with_fixed_latency() {
        let exec = FixedExecutor::succeeding(Duration::from_millis(100));
        let estimate = WarmupEstimator::new(5)
            .estimate(&exec, "mock://target", 50.0, 100)
            .await;

        assert_eq!(estimate.probes, 5);
        assert_eq!(estimate.succeeded, 5);
        assert_eq!(estimate.failed, 0);
        assert_eq!(estimate.mean_latency_ms, Some(100.0));
        assert_eq!(estimate.initial_vus, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probes_still_count_for_timing() {
        let exec = FixedExecutor::failing(Duration::from_millis(200));
        let estimate = WarmupEstimator::new(4)
            .estimate(&exec, "mock://target", 50.0, 8)
            .await;

        assert_eq!(estimate.failed, 4);
        // ceil(50 * 0.2) = 10, clamped to 8
        assert_eq!(estimate.initial_vus, 8);
    }

    struct Unreachable;

    impl RequestExecutor for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn execute<'a>(
            &'a self,
            _endpoint: &'a str,
        ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>> {
            Box::pin(async { Outcome::failure(None) })
        }
    }

    #[tokio::test]
    async fn test_no_latency_falls_back_to_one() {
        let estimate = WarmupEstimator::new(5)
            .estimate(&Unreachable, "mock://target", 500.0, 50)
            .await;

        assert_eq!(estimate.failed, 5);
        assert_eq!(estimate.mean_latency_ms, None);
        assert_eq!(estimate.initial_vus, 1);
    }
}
