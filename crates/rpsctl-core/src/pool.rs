use crate::vu::{VuContext, VuHandle};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// The set of active virtual users, in spawn order.
///
/// Only the controller loop mutates the pool, so it carries no lock. Bounds
/// (at most `max_vus`, at least one) are the controller's job; the pool just
/// does what it is told and never goes negative.
pub struct VuPool {
    ctx: VuContext,
    active: Vec<VuHandle>,
    /// Stopped by `shrink`, possibly still finishing a request
    retired: Vec<VuHandle>,
    next_id: usize,
}

/// What happened when the pool was torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainSummary {
    /// VUs still active when the drain started
    pub stopped: usize,
    /// Tasks that exited on their own, active and retired alike
    pub settled: usize,
    /// Tasks aborted after the drain timeout
    pub aborted: usize,
    /// Tasks that panicked
    pub failed: usize,
    /// Requests completed by the settled tasks
    pub requests: u64,
}

impl VuPool {
    pub fn new(ctx: VuContext) -> Self {
        Self {
            ctx,
            active: Vec::new(),
            retired: Vec::new(),
            next_id: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.active.len()
    }

    /// Total VUs ever spawned by this pool.
    pub fn spawned(&self) -> usize {
        self.next_id
    }

    /// Spawn `n` more VUs.
    pub fn grow(&mut self, n: usize) -> usize {
        for _ in 0..n {
            let id = self.next_id;
            self.next_id += 1;
            self.active.push(VuHandle::spawn(id, self.ctx.clone()));
        }
        if n > 0 {
            debug!("Pool grew by {} to {}", n, self.active.len());
        }
        n
    }

    /// Stop and remove up to `n` VUs, newest first. Returns how many were removed.
    pub fn shrink(&mut self, n: usize) -> usize {
        let n = n.min(self.active.len());
        for _ in 0..n {
            if let Some(vu) = self.active.pop() {
                vu.stop();
                self.retired.push(vu);
            }
        }
        if n > 0 {
            debug!("Pool shrank by {} to {}", n, self.active.len());
        }
        n
    }

    /// Stop every VU and wait for all tasks to settle.
    ///
    /// Tasks still running after `timeout` are aborted; an in-flight request
    /// that hangs cannot hold the run open forever.
    pub async fn drain(&mut self, timeout: Duration) -> DrainSummary {
        let stopped = self.active.len();
        for vu in &self.active {
            vu.stop();
        }

        let handles: Vec<VuHandle> = self
            .active
            .drain(..)
            .chain(self.retired.drain(..))
            .collect();
        let aborts: Vec<_> = handles.iter().map(|vu| vu.abort_handle()).collect();

        let mut summary = DrainSummary {
            stopped,
            ..DrainSummary::default()
        };

        let mut joins = Box::pin(join_all(handles.into_iter().map(|vu| vu.join())));
        let results = match tokio::time::timeout(timeout, &mut joins).await {
            Ok(results) => results,
            Err(_) => {
                warn!("Drain timed out after {:?}, aborting remaining VUs", timeout);
                for abort in &aborts {
                    abort.abort();
                }
                joins.await
            }
        };

        for res in results {
            match res {
                Ok(requests) => {
                    summary.settled += 1;
                    summary.requests += requests;
                }
                Err(e) if e.is_cancelled() => summary.aborted += 1,
                Err(e) => {
                    warn!("VU task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::Counters;
    use crate::executor::{FixedExecutor, Outcome, RequestExecutor};
    use std::pin::Pin;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn pool_with(executor: Arc<dyn RequestExecutor>, run_for: Duration) -> VuPool {
        VuPool::new(VuContext {
            executor,
            counters: Arc::new(Counters::new()),
            endpoint: Arc::from("mock://target"),
            deadline: Instant::now() + run_for,
        })
    }

    fn fixed_pool() -> VuPool {
        pool_with(
            Arc::new(FixedExecutor::succeeding(Duration::from_millis(50))),
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_grow_and_shrink_lifo() {
        let mut pool = fixed_pool();
        assert_eq!(pool.grow(3), 3);
        assert_eq!(pool.size(), 3);

        assert_eq!(pool.shrink(1), 1);
        assert_eq!(pool.size(), 2);
        // The newest VU went first
        let ids: Vec<usize> = pool.active.iter().map(|vu| vu.id()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(pool.retired.iter().all(|vu| vu.id() == 2 && !vu.is_running()));

        pool.grow(1);
        let ids: Vec<usize> = pool.active.iter().map(|vu| vu.id()).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(pool.spawned(), 4);

        pool.drain(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shrink_never_goes_negative() {
        let mut pool = fixed_pool();
        pool.grow(2);
        assert_eq!(pool.shrink(5), 2);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.shrink(1), 0);
        assert_eq!(pool.size(), 0);

        pool.drain(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_settles_every_vu() {
        let mut pool = fixed_pool();
        pool.grow(4);
        tokio::time::sleep(Duration::from_millis(120)).await;
        pool.shrink(1);

        let summary = pool.drain(Duration::from_secs(1)).await;
        assert_eq!(summary.stopped, 3);
        assert_eq!(summary.settled, 4);
        assert_eq!(summary.aborted, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(pool.size(), 0);
        // Each VU finished the request in flight at 120ms: 3 requests apiece
        assert_eq!(summary.requests, 12);
        assert_eq!(summary.requests, pool.ctx.counters.snapshot().total());
    }

    struct Hanging;

    impl RequestExecutor for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn execute<'a>(
            &'a self,
            _endpoint: &'a str,
        ) -> Pin<Box<dyn std::future::Future<Output = Outcome> + Send + 'a>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_hung_requests() {
        let mut pool = pool_with(Arc::new(Hanging), Duration::from_secs(60));
        pool.grow(2);
        tokio::task::yield_now().await;

        let summary = pool.drain(Duration::from_millis(500)).await;
        assert_eq!(summary.stopped, 2);
        assert_eq!(summary.settled, 0);
        assert_eq!(summary.aborted, 2);
    }
}
