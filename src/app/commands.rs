//! Intents accepted by the session core.

use crate::ramp::TransitionSpec;

/// Everything a caller can ask the controller to do.
///
/// Intents are queued onto the control thread and handled at tick
/// boundaries, so they are plain data with no references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    /// Begin a session with the currently staged parameters.
    /// `allow_software_only` permits running on the tone fallback when
    /// the hardware is not ready.
    Start { allow_software_only: bool },
    Stop,
    Pause,
    Resume,
    SetFrequency(u32),
    SetIntensity(u8),
    AdjustFrequency(i32),
    AdjustIntensity(i32),
    SetDurationMinutes(u32),
    /// Add or remove whole minutes from the running countdown.
    AdjustTime(i32),
    SetToneFallback(bool),
    /// Ramp to a new operating point mid-run. `None` uses the
    /// configured default shape.
    TransitionToStep {
        frequency_hz: u32,
        intensity: u8,
        spec: Option<TransitionSpec>,
    },
    SoftReduce,
    ResumeFromSoftReduce,
    Logout,
    /// Stop everything and end the control thread.
    Shutdown,
}
