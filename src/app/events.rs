//! Outbound event payloads and session status reporting.

use crate::fsm::StateId;

/// Why a session ended. Carried into the session log's stop record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    Logout,
    CountdownComplete,
    HardwareError,
    Unknown,
}

impl StopReason {
    /// Wire value used by the session-logging collaborator.
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Logout => "logout",
            Self::CountdownComplete => "countdown_complete",
            Self::HardwareError => "hardware_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Mid-run adjustments worth recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEventKind {
    AdjustFrequency,
    AdjustIntensity,
    AdjustTime,
}

impl RunEventKind {
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::AdjustFrequency => "adjust_frequency",
            Self::AdjustIntensity => "adjust_intensity",
            Self::AdjustTime => "adjust_time",
        }
    }
}

/// Point-in-time view of the session published to observers.
///
/// Copy so it can sit in a shared cell and be handed out without
/// locking anything for long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: StateId,
    pub frequency_hz: u32,
    pub intensity: u8,
    pub remaining_secs: u32,
    pub total_duration_secs: u32,
    pub hardware_ready: bool,
    pub tone_playing: bool,
    pub soft_reducing: bool,
}

impl SessionSnapshot {
    pub const IDLE: Self = Self {
        state: StateId::Idle,
        frequency_hz: 0,
        intensity: 0,
        remaining_secs: 0,
        total_duration_secs: 0,
        hardware_ready: false,
        tone_playing: false,
        soft_reducing: false,
    };
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Which physical channel an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Frequency,
    Amplitude,
    Mode,
}

/// Error notifications published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEvent {
    /// One write to a channel failed. The session may continue.
    ChannelWriteFailure {
        channel: ChannelKind,
        cause: &'static str,
    },
    /// The device is missing or not initialized.
    ChannelUnavailable,
    /// A ramp gave up after repeated failures. The session stops.
    RampAborted { failures: u8 },
    /// The session-logging collaborator failed. Informational only.
    SessionLoggingFailure,
}
