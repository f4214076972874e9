use crate::executor::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cumulative request tallies shared by every virtual user and the sampler.
///
/// Plain atomic adds, so concurrent writers never lose an increment.
#[derive(Debug, Default)]
pub struct Counters {
    success: AtomicU64,
    errors: AtomicU64,
    latency_micros: AtomicU64,
    latency_samples: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &Outcome) {
        if outcome.success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(latency) = outcome.latency {
            let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
            self.latency_micros.fetch_add(micros, Ordering::Relaxed);
            self.latency_samples.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.success.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            latency_micros: self.latency_micros.load(Ordering::Relaxed),
            latency_samples: self.latency_samples.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub success: u64,
    pub errors: u64,
    latency_micros: u64,
    latency_samples: u64,
}

impl CounterSnapshot {
    /// Success and error requests together; this is what RPS is measured on.
    pub fn total(&self) -> u64 {
        self.success + self.errors
    }

    /// Mean over every request that reported a latency.
    pub fn average_latency(&self) -> Option<Duration> {
        if self.latency_samples == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.latency_micros / self.latency_samples,
        ))
    }
}
