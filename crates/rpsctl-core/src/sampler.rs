use crate::counters::CounterSnapshot;
use std::time::Duration;
use tokio::time::Instant;

/// One throughput measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: Instant,
    /// Cumulative success + error count at `at`
    pub total: u64,
    /// Requests completed since the previous sample
    pub delta: u64,
    /// Actual wall time since the previous sample
    pub elapsed: Duration,
    pub rps: f64,
}

/// Derives RPS from cumulative counter deltas.
///
/// Uses the measured time between samples rather than the nominal tick
/// period, so a late tick does not inflate the rate.
#[derive(Debug)]
pub struct ThroughputSampler {
    last_at: Instant,
    last_total: u64,
    last: Option<Sample>,
}

impl ThroughputSampler {
    pub fn new(start: Instant, start_total: u64) -> Self {
        Self {
            last_at: start,
            last_total: start_total,
            last: None,
        }
    }

    pub fn sample(&mut self, snapshot: &CounterSnapshot, now: Instant) -> Sample {
        let total = snapshot.total();
        let delta = total.saturating_sub(self.last_total);
        let elapsed = now.saturating_duration_since(self.last_at);

        let secs = elapsed.as_secs_f64();
        let rps = if secs > 0.0 { delta as f64 / secs } else { 0.0 };

        let sample = Sample {
            at: now,
            total,
            delta,
            elapsed,
            rps,
        };

        self.last_at = now;
        self.last_total = total;
        self.last = Some(sample);
        sample
    }

    pub fn last(&self) -> Option<&Sample> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::Counters;
    use crate::executor::Outcome;

    fn record(counters: &Counters, n: usize) {
        for _ in 0..n {
            counters.record(&Outcome::success(Duration::from_millis(1)));
        }
    }

    #[test]
    fn test_rps_uses_actual_elapsed() {
        let start = Instant::now();
        let counters = Counters::new();
        let mut sampler = ThroughputSampler::new(start, 0);

        record(&counters, 30);
        let s = sampler.sample(&counters.snapshot(), start + Duration::from_millis(1500));
        assert_eq!(s.delta, 30);
        assert_eq!(s.total, 30);
        assert!((s.rps - 20.0).abs() < 1e-9, "rps: {}", s.rps);

        record(&counters, 10);
        let s = sampler.sample(&counters.snapshot(), start + Duration::from_millis(2000));
        assert_eq!(s.delta, 10);
        assert_eq!(s.elapsed, Duration::from_millis(500));
        assert!((s.rps - 20.0).abs() < 1e-9, "rps: {}", s.rps);
        assert_eq!(sampler.last().map(|s| s.total), Some(40));
    }

    #[test]
    fn test_zero_elapsed_is_finite() {
        let start = Instant::now();
        let counters = Counters::new();
        let mut sampler = ThroughputSampler::new(start, 0);

        record(&counters, 5);
        let s = sampler.sample(&counters.snapshot(), start);
        assert_eq!(s.rps, 0.0);
        assert!(s.rps.is_finite());

        // Same instant again
        let s = sampler.sample(&counters.snapshot(), start);
        assert_eq!(s.rps, 0.0);
    }

    #[test]
    fn test_no_traffic_is_zero_rps() {
        let start = Instant::now();
        let mut sampler = ThroughputSampler::new(start, 0);
        let s = sampler.sample(&CounterSnapshot::default(), start + Duration::from_secs(1));
        assert_eq!(s.delta, 0);
        assert_eq!(s.rps, 0.0);
    }
}
