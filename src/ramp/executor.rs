//! Tick-driven ramp execution.
//!
//! The executor walks a [`RampPlan`] one point per tick period,
//! pushing each point through the gateway. It runs inside the control
//! thread, so "cancel" is synchronous: after [`TransitionExecutor::cancel`]
//! returns, no further writes from that ramp can happen.

use std::time::Instant;

use log::{debug, warn};

use super::{RampPlan, RampPoint};
use crate::app::events::ErrorEvent;
use crate::app::ports::{AudioOutputPort, DeviceChannelPort, EventSink};
use crate::gateway::HardwareGateway;

/// Fraction of a tick period a step may spend before a warning logs.
const BUDGET_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampState {
    /// No plan loaded.
    Idle,
    /// Plan in progress.
    Running,
    /// Final point applied.
    Completed,
    /// Cancelled before the final point.
    Cancelled,
    /// Too many consecutive failures. Session must stop.
    Aborted,
}

pub struct TransitionExecutor {
    plan: Option<RampPlan>,
    index: usize,
    state: RampState,
    /// Absolute time the next point is due, in control-clock ms.
    next_due_ms: u64,
    last_sent: Option<RampPoint>,
    consecutive_failures: u8,
    failure_threshold: u8,
}

impl TransitionExecutor {
    pub fn new(failure_threshold: u8) -> Self {
        Self {
            plan: None,
            index: 0,
            state: RampState::Idle,
            next_due_ms: 0,
            last_sent: None,
            consecutive_failures: 0,
            failure_threshold,
        }
    }

    pub fn state(&self) -> RampState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RampState::Running
    }

    /// Load a new plan. Any ramp in progress is cancelled first, so a
    /// replacement never interleaves with its predecessor.
    pub fn begin(&mut self, plan: RampPlan, now_ms: u64) {
        if self.is_running() {
            self.cancel();
        }
        debug!(
            "ramp begin: {} points at {}ms",
            plan.points.len(),
            plan.tick_ms
        );
        self.next_due_ms = now_ms;
        self.plan = Some(plan);
        self.index = 0;
        self.last_sent = None;
        self.consecutive_failures = 0;
        self.state = RampState::Running;
    }

    /// Stop the current ramp where it stands. Idempotent.
    pub fn cancel(&mut self) {
        if self.is_running() {
            debug!("ramp cancelled at point {}", self.index);
            self.state = RampState::Cancelled;
        }
        self.plan = None;
    }

    /// Advance the ramp if a point is due. Call every control tick.
    pub fn step<C: DeviceChannelPort, A: AudioOutputPort>(
        &mut self,
        gateway: &mut HardwareGateway<C, A>,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> RampState {
        if !self.is_running() {
            return self.state;
        }
        let Some(plan) = &self.plan else {
            self.state = RampState::Idle;
            return self.state;
        };
        if now_ms < self.next_due_ms {
            return self.state;
        }
        // Output was turned off underneath the ramp. Stop quietly.
        if !gateway.output_active() {
            self.cancel();
            return self.state;
        }

        let tick_ms = plan.tick_ms;
        let point = plan.points[self.index];
        let started = Instant::now();

        // Identical consecutive points still consume their tick so the
        // plan keeps its duration.
        let mut failed = false;
        if self.last_sent != Some(point) {
            if gateway.apply_frequency(point.frequency_hz, sink).is_failure() {
                failed = true;
            }
            if gateway.apply_intensity(point.intensity, sink).is_failure() {
                failed = true;
            }
        }

        if failed {
            self.consecutive_failures += 1;
            if self.consecutive_failures > self.failure_threshold {
                warn!(
                    "ramp aborted after {} consecutive failures",
                    self.consecutive_failures
                );
                sink.error(&ErrorEvent::RampAborted {
                    failures: self.consecutive_failures,
                });
                self.state = RampState::Aborted;
                self.plan = None;
                return self.state;
            }
        } else {
            self.consecutive_failures = 0;
            self.last_sent = Some(point);
        }

        let budget_ms = f64::from(tick_ms) * BUDGET_FRACTION;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > budget_ms {
            warn!("ramp step took {elapsed_ms:.1}ms of a {tick_ms}ms tick");
        }

        self.index += 1;
        self.next_due_ms += u64::from(tick_ms);

        let len = self.plan.as_ref().map_or(0, |p| p.points.len());
        if self.index >= len {
            debug!("ramp complete");
            self.state = RampState::Completed;
            self.plan = None;
        }
        self.state
    }
}
