//! Shared mutable context threaded through every state handler.

use crate::app::events::StopReason;
use crate::config::ControllerConfig;

/// All data the state handlers read and write.
///
/// The service owns one instance for the life of the controller. State
/// handlers communicate outward through the `*_request` fields, which
/// the service drains after each tick.
pub struct SessionContext {
    pub config: ControllerConfig,

    /// Staged output frequency in Hz.
    pub frequency_hz: u32,
    /// Staged output intensity, percent.
    pub intensity: u8,
    /// Configured session length.
    pub duration_minutes: u32,
    /// Countdown, decremented each control tick while a session runs.
    pub remaining_ms: u64,

    /// Latest readiness of the hardware path.
    pub hardware_ready: bool,
    /// Session running on the tone fallback with no hardware.
    pub software_only: bool,
    /// User preference: mirror hardware output with the tone.
    pub tone_fallback: bool,

    /// Intensity at the moment a soft reduction began. Restored on
    /// resume, cleared on exit.
    pub soft_original_intensity: Option<u8>,
    /// Milliseconds accumulated toward the next soft-reduce step.
    pub soft_accum_ms: u32,

    /// Stop demanded by the current state (countdown expiry). The
    /// service takes this and finalizes the stop.
    pub stop_request: Option<StopReason>,
    /// Intensity change demanded by the current state (soft reduce).
    pub intensity_request: Option<u8>,

    /// Ticks since the current state was entered. Maintained by the engine.
    pub ticks_in_state: u64,
    /// Total ticks since start. Maintained by the engine.
    pub total_ticks: u64,
}

impl SessionContext {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            frequency_hz: 0,
            intensity: 0,
            duration_minutes: 0,
            remaining_ms: 0,
            hardware_ready: false,
            software_only: false,
            tone_fallback: false,
            soft_original_intensity: None,
            soft_accum_ms: 0,
            stop_request: None,
            intensity_request: None,
            ticks_in_state: 0,
            total_ticks: 0,
        }
    }

    /// Whole seconds left on the countdown, rounded up so the display
    /// never shows 0 while time remains.
    pub fn remaining_secs(&self) -> u32 {
        (self.remaining_ms.div_ceil(1000)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_secs_rounds_up() {
        let mut ctx = SessionContext::new(ControllerConfig::default());
        ctx.remaining_ms = 1;
        assert_eq!(ctx.remaining_secs(), 1);
        ctx.remaining_ms = 1000;
        assert_eq!(ctx.remaining_secs(), 1);
        ctx.remaining_ms = 1001;
        assert_eq!(ctx.remaining_secs(), 2);
        ctx.remaining_ms = 0;
        assert_eq!(ctx.remaining_secs(), 0);
    }
}
