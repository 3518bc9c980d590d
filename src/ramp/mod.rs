//! Parameter ramp planning.
//!
//! Given a start and end point for the two output parameters, the
//! planner produces a fixed schedule of evenly-spread intermediate
//! values. Planning is pure. Execution lives in [`executor`].

pub mod executor;

use heapless::Vec;
use log::warn;

/// Smallest tick period the executor will run at.
pub const MIN_TICK_MS: u32 = 10;

/// Hard cap on plan length. Longer requests get a coarser tick.
pub const MAX_STEPS: usize = 256;

/// One scheduled point of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampPoint {
    pub frequency_hz: u32,
    pub intensity: u8,
}

/// How to shape a transition between two operating points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSpec {
    /// Spread the change over a wall-clock duration.
    Duration { duration_ms: u32, tick_ms: u32 },
    /// Spread the change over an exact number of steps.
    Steps { steps: u32, tick_ms: u32 },
}

impl TransitionSpec {
    /// Step count and tick period this spec resolves to.
    fn resolve(self) -> (usize, u32) {
        match self {
            Self::Duration { duration_ms, tick_ms } => {
                let tick = tick_ms.max(MIN_TICK_MS);
                let steps = duration_ms.div_ceil(tick).max(1) as usize;
                if steps > MAX_STEPS {
                    // Keep total duration, coarsen the tick.
                    let tick = duration_ms.div_ceil(MAX_STEPS as u32).max(MIN_TICK_MS);
                    warn!("ramp plan capped at {MAX_STEPS} steps, tick raised to {tick}ms");
                    (MAX_STEPS, tick)
                } else {
                    (steps, tick)
                }
            }
            Self::Steps { steps, tick_ms } => {
                let tick = tick_ms.max(MIN_TICK_MS);
                let steps = (steps.max(1) as usize).min(MAX_STEPS);
                (steps, tick)
            }
        }
    }
}

/// A finished schedule ready for the executor.
///
/// `points` always contains at least one element and its last element
/// is exactly the requested target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampPlan {
    pub tick_ms: u32,
    pub points: Vec<RampPoint, MAX_STEPS>,
}

impl RampPlan {
    /// Plan a ramp from `from` to `to` shaped by `spec`.
    ///
    /// When the endpoints are identical the plan collapses to a single
    /// point so the executor applies the target once and completes.
    pub fn between(from: RampPoint, to: RampPoint, spec: TransitionSpec) -> Self {
        if from == to {
            let mut points = Vec::new();
            let _ = points.push(to);
            return Self {
                tick_ms: MIN_TICK_MS,
                points,
            };
        }

        let (steps, tick_ms) = spec.resolve();
        if steps <= 1 {
            let mut points = Vec::new();
            let _ = points.push(to);
            return Self { tick_ms, points };
        }

        let freqs = distribute(from.frequency_hz as i64, to.frequency_hz as i64, steps);
        let ints = distribute(from.intensity as i64, to.intensity as i64, steps);

        let mut points = Vec::new();
        for i in 0..steps {
            let _ = points.push(RampPoint {
                frequency_hz: freqs[i] as u32,
                intensity: ints[i] as u8,
            });
        }
        Self { tick_ms, points }
    }

    pub fn target(&self) -> RampPoint {
        // Plans always hold at least one point.
        self.points[self.points.len() - 1]
    }
}

/// Spread the integer range `[start, end]` across `steps` values using
/// error diffusion, so rounding error never accumulates. The first
/// value is `start` and the last is exactly `end`.
fn distribute(start: i64, end: i64, steps: usize) -> Vec<i64, MAX_STEPS> {
    let mut out = Vec::new();
    if steps <= 1 {
        let _ = out.push(end);
        return out;
    }
    let span = end - start;
    let denom = (steps - 1) as i64;
    for i in 0..steps {
        // Floor of the ideal value start + span*i/denom. Computing from
        // the index each time keeps rounding error from accumulating:
        // i=0 yields start exactly and i=denom yields end exactly.
        let value = start + (span * i as i64).div_euclid(denom);
        let _ = out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(f: u32, i: u8) -> RampPoint {
        RampPoint {
            frequency_hz: f,
            intensity: i,
        }
    }

    #[test]
    fn endpoints_are_exact() {
        let plan = RampPlan::between(
            pt(10, 0),
            pt(40, 100),
            TransitionSpec::Duration {
                duration_ms: 400,
                tick_ms: 20,
            },
        );
        assert_eq!(plan.points[0], pt(10, 0));
        assert_eq!(plan.target(), pt(40, 100));
    }

    #[test]
    fn duration_spec_step_count() {
        let plan = RampPlan::between(
            pt(0, 0),
            pt(100, 100),
            TransitionSpec::Duration {
                duration_ms: 400,
                tick_ms: 20,
            },
        );
        assert_eq!(plan.points.len(), 20);
        assert_eq!(plan.tick_ms, 20);
    }

    #[test]
    fn steps_spec_honored() {
        let plan = RampPlan::between(
            pt(10, 10),
            pt(50, 90),
            TransitionSpec::Steps { steps: 5, tick_ms: 50 },
        );
        assert_eq!(plan.points.len(), 5);
        assert_eq!(plan.tick_ms, 50);
    }

    #[test]
    fn identical_endpoints_single_point() {
        let plan = RampPlan::between(
            pt(40, 60),
            pt(40, 60),
            TransitionSpec::Duration {
                duration_ms: 400,
                tick_ms: 20,
            },
        );
        assert_eq!(plan.points.len(), 1);
        assert_eq!(plan.points[0], pt(40, 60));
        assert_eq!(plan.tick_ms, MIN_TICK_MS);
    }

    #[test]
    fn tick_floor_applied() {
        let plan = RampPlan::between(
            pt(0, 0),
            pt(10, 10),
            TransitionSpec::Duration {
                duration_ms: 100,
                tick_ms: 1,
            },
        );
        assert_eq!(plan.tick_ms, MIN_TICK_MS);
        assert_eq!(plan.points.len(), 10);
    }

    #[test]
    fn long_duration_capped() {
        let plan = RampPlan::between(
            pt(0, 0),
            pt(100, 100),
            TransitionSpec::Duration {
                duration_ms: 60_000,
                tick_ms: 10,
            },
        );
        assert!(plan.points.len() <= MAX_STEPS);
        assert_eq!(plan.target(), pt(100, 100));
        // Total duration roughly preserved.
        let total = plan.tick_ms * plan.points.len() as u32;
        assert!(total >= 60_000);
    }

    #[test]
    fn descending_ramp_monotone() {
        let plan = RampPlan::between(
            pt(80, 100),
            pt(20, 20),
            TransitionSpec::Steps { steps: 12, tick_ms: 20 },
        );
        for pair in plan.points.windows(2) {
            assert!(pair[1].frequency_hz <= pair[0].frequency_hz);
            assert!(pair[1].intensity <= pair[0].intensity);
        }
        assert_eq!(plan.points[0], pt(80, 100));
        assert_eq!(plan.target(), pt(20, 20));
    }

    #[test]
    fn step_sizes_vary_at_most_one() {
        let plan = RampPlan::between(
            pt(0, 0),
            pt(37, 71),
            TransitionSpec::Steps { steps: 9, tick_ms: 20 },
        );
        let deltas: std::vec::Vec<i64> = plan
            .points
            .windows(2)
            .map(|p| p[1].intensity as i64 - p[0].intensity as i64)
            .collect();
        let min = deltas.iter().min().unwrap();
        let max = deltas.iter().max().unwrap();
        assert!(max - min <= 1, "deltas {deltas:?}");
    }
}
