use crate::config::StepPolicy;
use serde::{Deserialize, Serialize};

/// What a controller tick did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "vus", rename_all = "snake_case")]
pub enum Decision {
    Grow(usize),
    Shrink(usize),
    Hold,
}

/// Closed-loop rule: under target and below the cap, grow; over target and
/// above one VU, shrink; otherwise hold. Strict comparisons, no dead-band.
#[derive(Debug, Clone)]
pub struct Controller {
    target_rps: f64,
    max_vus: usize,
    step: StepPolicy,
}

impl Controller {
    pub fn new(target_rps: f64, max_vus: usize, step: StepPolicy) -> Self {
        Self {
            target_rps,
            max_vus: max_vus.max(1),
            step,
        }
    }

    pub fn target_rps(&self) -> f64 {
        self.target_rps
    }

    pub fn max_vus(&self) -> usize {
        self.max_vus
    }

    /// Decide the next pool change. The result always keeps the pool within `[1, max_vus]`.
    pub fn decide(&self, observed_rps: f64, pool_size: usize) -> Decision {
        if observed_rps < self.target_rps && pool_size < self.max_vus {
            let headroom = self.max_vus - pool_size;
            Decision::Grow(self.step_size(observed_rps, pool_size).min(headroom))
        } else if observed_rps > self.target_rps && pool_size > 1 {
            let excess = pool_size - 1;
            Decision::Shrink(self.step_size(observed_rps, pool_size).min(excess))
        } else {
            Decision::Hold
        }
    }

    fn step_size(&self, observed_rps: f64, pool_size: usize) -> usize {
        match self.step {
            StepPolicy::Fixed { size } => size.max(1),
            StepPolicy::Proportional { max_step } => {
                if observed_rps <= 0.0 || pool_size == 0 {
                    return 1;
                }
                let per_vu = observed_rps / pool_size as f64;
                let wanted = ((self.target_rps - observed_rps).abs() / per_vu).ceil();
                // `wanted` is finite and positive here; the cast saturates
                (wanted as usize).clamp(1, max_step.max(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_rule() {
        let c = Controller::new(20.0, 10, StepPolicy::default());
        assert_eq!(c.decide(10.0, 1), Decision::Grow(1));
        assert_eq!(c.decide(30.0, 3), Decision::Shrink(1));
        assert_eq!(c.decide(20.0, 3), Decision::Hold);
    }

    #[test]
    fn test_bounds_are_respected() {
        let c = Controller::new(20.0, 10, StepPolicy::Fixed { size: 4 });
        // At the cap: under target but cannot grow
        assert_eq!(c.decide(0.0, 10), Decision::Hold);
        // Near the cap: growth is clipped
        assert_eq!(c.decide(0.0, 8), Decision::Grow(2));
        // At the floor: over target but cannot shrink
        assert_eq!(c.decide(100.0, 1), Decision::Hold);
        // Near the floor: shrink is clipped
        assert_eq!(c.decide(100.0, 3), Decision::Shrink(2));
    }

    #[test]
    fn test_proportional_step() {
        let c = Controller::new(100.0, 50, StepPolicy::Proportional { max_step: 10 });
        // 2 VUs at 20 rps: 10 rps per VU, 80 short -> 8 more
        assert_eq!(c.decide(20.0, 2), Decision::Grow(8));
        // capped by max_step
        assert_eq!(c.decide(10.0, 10), Decision::Grow(10));
        // 10 VUs at 150 rps: 15 per VU, 50 over -> ceil(3.33) = 4
        assert_eq!(c.decide(150.0, 10), Decision::Shrink(4));
        // no throughput information yet
        assert_eq!(c.decide(0.0, 1), Decision::Grow(1));
    }

    #[test]
    fn test_random_walk_stays_in_bounds() {
        let policies = [
            StepPolicy::Fixed { size: 1 },
            StepPolicy::Fixed { size: 3 },
            StepPolicy::Proportional { max_step: 7 },
        ];
        for step in policies {
            let c = Controller::new(50.0, 12, step);
            let mut size = 1usize;
            for i in 0..2_000u64 {
                let observed = ((i * 7919) % 131) as f64;
                match c.decide(observed, size) {
                    Decision::Grow(n) => size += n,
                    Decision::Shrink(n) => size -= n,
                    Decision::Hold => {}
                }
                assert!((1..=12).contains(&size), "size {} out of bounds", size);
            }
        }
    }
}
