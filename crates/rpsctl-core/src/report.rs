use crate::controller::Decision;
use crate::pool::DrainSummary;
use crate::warmup::WarmupEstimate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// State after one controller tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// 1-based tick number
    pub tick: usize,
    pub elapsed_secs: f64,
    pub observed_rps: f64,
    /// Pool size after the decision was applied
    pub active_vus: usize,
    pub cumulative_success: u64,
    pub cumulative_errors: u64,
    pub decision: Decision,
}

/// Final statistics, produced once at shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub final_vus: usize,
    /// RPS of the last tick
    pub final_rps: f64,
    /// Total requests over the whole run time
    pub mean_rps: f64,
    pub avg_latency_ms: Option<f64>,
    pub peak_vus: usize,
    pub ticks: usize,
    pub vus_spawned: usize,
    pub drain: DrainSummary,
    pub warmup: Option<WarmupEstimate>,
    /// Stopped before the configured duration elapsed
    pub cancelled: bool,
}

/// Sink for the reporting stream.
pub trait Reporter: Send {
    fn tick(&mut self, report: &TickReport);

    fn finish(&mut self, result: &RunResult);
}

/// Writes every record as a `tracing` event.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn tick(&mut self, r: &TickReport) {
        info!(
            "Time: {:.1}s | RPS: {:.1} | VUs: {} | Success: {} | Errors: {} | {:?}",
            r.elapsed_secs,
            r.observed_rps,
            r.active_vus,
            r.cumulative_success,
            r.cumulative_errors,
            r.decision
        );
    }

    fn finish(&mut self, r: &RunResult) {
        info!(
            "Test finished: duration={:.1}s total={} success={} errors={} final_vus={} final_rps={:.1}",
            r.elapsed_secs,
            r.total_requests,
            r.success_count,
            r.error_count,
            r.final_vus,
            r.final_rps
        );
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub ticks: Vec<TickReport>,
    pub result: Option<RunResult>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for Timeline {
    fn tick(&mut self, report: &TickReport) {
        self.ticks.push(report.clone());
    }

    fn finish(&mut self, result: &RunResult) {
        self.result = Some(result.clone());
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn tick(&mut self, report: &TickReport) {
        (**self).tick(report);
    }

    fn finish(&mut self, result: &RunResult) {
        (**self).finish(result);
    }
}

/// Fan out to both reporters, in order.
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn tick(&mut self, report: &TickReport) {
        self.0.tick(report);
        self.1.tick(report);
    }

    fn finish(&mut self, result: &RunResult) {
        self.0.finish(result);
        self.1.finish(result);
    }
}
