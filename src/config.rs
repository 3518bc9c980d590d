//! Controller configuration parameters
//!
//! All tunable parameters for the session controller.
//! Values can be overridden by the embedding application before the
//! control thread is spawned.

use serde::{Deserialize, Serialize};

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Control loop ---
    /// Control tick interval (milliseconds). Every hardware write,
    /// ramp step and countdown update is driven from this cadence.
    pub control_tick_ms: u32,

    // --- Mode switching ---
    /// Settle delay between the forced OFF write and the SINE write
    /// when enabling output (milliseconds). The synth channel needs a
    /// clean mode edge; see the gateway for details.
    pub mode_settle_ms: u32,

    // --- Ramps ---
    /// Default transition duration for preset/step changes (milliseconds).
    pub default_transition_ms: u32,
    /// Default ramp tick for preset/step changes (milliseconds).
    pub default_transition_tick_ms: u32,
    /// Consecutive write failures tolerated per ramp before it aborts.
    pub ramp_failure_threshold: u8,

    // --- Soft reduction ---
    /// Intensity the emergency reduction ramps down to.
    pub soft_reduce_target: u8,
    /// Interval between reduction steps (milliseconds).
    pub soft_reduce_tick_ms: u32,
    /// Smallest per-step intensity decrement.
    pub soft_reduce_min_step: u8,
    /// Proportional divisor: each step removes `(current - target) / divisor`,
    /// floored at `soft_reduce_min_step`, giving the decelerating shape.
    pub soft_reduce_divisor: u8,

    // --- Tone fallback ---
    /// Sample rate of the synthesized fallback tone (Hz).
    pub tone_sample_rate_hz: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Control loop
            control_tick_ms: 20, // 50 Hz

            // Mode switching
            mode_settle_ms: 5,

            // Ramps
            default_transition_ms: 400,
            default_transition_tick_ms: 20,
            ramp_failure_threshold: 3,

            // Soft reduction
            soft_reduce_target: 20,
            soft_reduce_tick_ms: 80,
            soft_reduce_min_step: 5,
            soft_reduce_divisor: 10,

            // Tone fallback
            tone_sample_rate_hz: 44_100,
        }
    }
}

impl ControllerConfig {
    /// Range-check the configuration. Rejects values that would stall
    /// the control loop or break the reduction ramp's termination.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.control_tick_ms == 0 {
            return Err("control_tick_ms must be positive");
        }
        if self.default_transition_tick_ms == 0 {
            return Err("default_transition_tick_ms must be positive");
        }
        if self.soft_reduce_tick_ms < self.control_tick_ms {
            return Err("soft_reduce_tick_ms must not be shorter than the control tick");
        }
        if self.soft_reduce_min_step == 0 {
            return Err("soft_reduce_min_step must be positive");
        }
        if self.soft_reduce_divisor == 0 {
            return Err("soft_reduce_divisor must be positive");
        }
        if self.tone_sample_rate_hz == 0 {
            return Err("tone_sample_rate_hz must be positive");
        }
        Ok(())
    }
}
