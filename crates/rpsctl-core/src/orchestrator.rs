//! Run lifecycle: warm-up, initial pool, periodic control loop, shutdown.
//!
//! Shutdown happens in a fixed order: the ticker is cancelled first so no
//! further decision can touch the pool, then every VU is stopped and drained,
//! and only then is the final result computed and reported.

use crate::config::Config;
use crate::controller::{Controller, Decision};
use crate::counters::Counters;
use crate::error::ConfigResult;
use crate::executor::RequestExecutor;
use crate::pool::VuPool;
use crate::report::{Reporter, RunResult, TickReport};
use crate::sampler::ThroughputSampler;
use crate::ticker::Ticker;
use crate::vu::VuContext;
use crate::warmup::WarmupEstimator;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Orchestrator {
    config: Arc<Config>,
    executor: Arc<dyn RequestExecutor>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Validates the configuration; nothing is spawned on error.
    pub fn new(config: Config, executor: Arc<dyn RequestExecutor>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            executor,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling this token ends the run early through the normal shutdown path.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run<R: Reporter + ?Sized>(&self, reporter: &mut R) -> RunResult {
        let load = &self.config.load;
        let endpoint = self.config.target.url.as_str();
        let controller = Controller::new(load.target_rps, load.max_vus, load.step);

        let warmup = match &self.config.warmup {
            Some(w) => Some(
                WarmupEstimator::new(w.samples)
                    .estimate(
                        self.executor.as_ref(),
                        endpoint,
                        load.target_rps,
                        load.max_vus,
                    )
                    .await,
            ),
            None => None,
        };
        let initial_vus = warmup
            .as_ref()
            .map_or(load.initial_vus, |w| w.initial_vus)
            .clamp(1, controller.max_vus());

        let start = Instant::now();
        let deadline = start + load.duration();
        let counters = Arc::new(Counters::new());
        let mut pool = VuPool::new(VuContext {
            executor: self.executor.clone(),
            counters: counters.clone(),
            endpoint: Arc::from(endpoint),
            deadline,
        });
        let mut sampler = ThroughputSampler::new(start, 0);
        let mut ticker = Ticker::new(start, load.interval(), deadline, self.cancel.child_token());

        info!(
            "Starting test against {} using {} executor: target {} RPS, {} initial VUs, max {} VUs, {}ms",
            endpoint,
            self.executor.name(),
            load.target_rps,
            initial_vus,
            controller.max_vus(),
            load.duration_ms
        );
        pool.grow(initial_vus);
        let mut peak_vus = pool.size();
        let mut ticks = 0;

        while ticker.next().await.is_some() {
            ticks += 1;
            let now = Instant::now();
            let snapshot = counters.snapshot();
            let sample = sampler.sample(&snapshot, now);

            let decision = controller.decide(sample.rps, pool.size());
            match decision {
                Decision::Grow(n) => {
                    pool.grow(n);
                }
                Decision::Shrink(n) => {
                    pool.shrink(n);
                }
                Decision::Hold => {}
            }
            peak_vus = peak_vus.max(pool.size());

            reporter.tick(&TickReport {
                tick: ticks,
                elapsed_secs: now.duration_since(start).as_secs_f64(),
                observed_rps: sample.rps,
                active_vus: pool.size(),
                cumulative_success: snapshot.success,
                cumulative_errors: snapshot.errors,
                decision,
            });
        }

        let cancelled = self.cancel.is_cancelled();
        ticker.cancel();
        if cancelled {
            info!("Run cancelled after {} ticks, shutting down", ticks);
        }

        let final_vus = pool.size();
        info!("Stopping {} VUs...", final_vus);
        let drain = pool.drain(load.drain_timeout()).await;

        let snapshot = counters.snapshot();
        let elapsed = start.elapsed().as_secs_f64();
        let total_requests = snapshot.total();

        let result = RunResult {
            elapsed_secs: elapsed,
            total_requests,
            success_count: snapshot.success,
            error_count: snapshot.errors,
            final_vus,
            final_rps: sampler.last().map_or(0.0, |s| s.rps),
            mean_rps: if elapsed > 0.0 {
                total_requests as f64 / elapsed
            } else {
                0.0
            },
            avg_latency_ms: snapshot
                .average_latency()
                .map(|d| d.as_micros() as f64 / 1000.0),
            peak_vus,
            ticks,
            vus_spawned: pool.spawned(),
            drain,
            warmup,
            cancelled,
        };

        reporter.finish(&result);
        result
    }
}
