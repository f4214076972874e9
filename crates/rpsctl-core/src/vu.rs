//! Virtual users: independent tasks that fire requests back-to-back.
//!
//! A VU runs until either its stop flag is cleared or the run deadline
//! passes, whichever it observes first. Stopping never cancels the request
//! that is already in flight; the loop sees the flag on its next check.

use crate::counters::Counters;
use crate::executor::RequestExecutor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::debug;

/// Everything a VU needs, shared with every other VU in the run.
#[derive(Clone)]
pub struct VuContext {
    pub executor: Arc<dyn RequestExecutor>,
    pub counters: Arc<Counters>,
    pub endpoint: Arc<str>,
    /// Run start + test duration
    pub deadline: Instant,
}

/// Owner-side view of a spawned VU.
pub struct VuHandle {
    id: usize,
    running: Arc<AtomicBool>,
    task: JoinHandle<u64>,
}

impl VuHandle {
    /// Start a VU loop immediately.
    pub fn spawn(id: usize, ctx: VuContext) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_vu(id, ctx, running.clone()));
        Self { id, running, task }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Ask the VU to stop after its current request. Idempotent, never blocks.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("VU {} stop requested", self.id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    /// Wait for the loop to exit. Yields the number of requests it completed.
    pub async fn join(self) -> Result<u64, JoinError> {
        self.task.await
    }
}

async fn run_vu(id: usize, ctx: VuContext, running: Arc<AtomicBool>) -> u64 {
    let mut completed = 0u64;

    while running.load(Ordering::Acquire) && Instant::now() < ctx.deadline {
        let outcome = ctx.executor.execute(&ctx.endpoint).await;
        ctx.counters.record(&outcome);
        completed += 1;
    }

    // Deadline exit lands here too; a stop request already cleared the flag.
    running.store(false, Ordering::Release);
    debug!("VU {} exited after {} requests", id, completed);
    completed
}
