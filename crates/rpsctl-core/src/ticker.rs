use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Fixed-period tick source bounded by a deadline.
///
/// Fires at `start + period`, `start + 2 * period`, ... up to and including a
/// tick that lands exactly on the deadline. Once the token is cancelled no
/// further tick is handed out. Ticks are only produced when `next` is polled,
/// so a slow consumer delays or skips ticks; they never overlap.
pub struct Ticker {
    interval: Interval,
    deadline: Instant,
    token: CancellationToken,
    done: bool,
}

impl Ticker {
    pub fn new(start: Instant, period: Duration, deadline: Instant, token: CancellationToken) -> Self {
        let mut interval = interval_at(start + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            deadline,
            token,
            done: false,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&mut self) {
        self.token.cancel();
        self.done = true;
    }

    /// Wait for the next tick. `None` once the deadline passed or the token was cancelled.
    pub async fn next(&mut self) -> Option<Instant> {
        if self.done || self.token.is_cancelled() {
            self.done = true;
            return None;
        }

        tokio::select! {
            biased;

            _ = self.token.cancelled() => {
                self.done = true;
                None
            }
            at = self.interval.tick() => {
                if at > self.deadline {
                    self.done = true;
                    return None;
                }
                if at == self.deadline {
                    self.done = true;
                }
                Some(at)
            }
            _ = sleep_until(self.deadline) => {
                self.done = true;
                None
            }
        }
    }
}
