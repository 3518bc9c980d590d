//! Port traits at the application boundary.
//!
//! The session core talks to the outside world only through these
//! traits. Production adapters live in [`crate::adapters`]; tests
//! substitute mocks.

use crate::error::{ChannelError, SessionLogError};

/// Output stage mode of the waveform channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Off,
    Sine,
}

/// Per-channel readiness reported by the device adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub device_open: bool,
    pub frequency_ready: bool,
    pub amplitude_ready: bool,
}

impl Readiness {
    /// Hardware output is usable only when everything is up.
    pub fn ready(&self) -> bool {
        self.device_open && self.frequency_ready && self.amplitude_ready
    }
}

/// Asynchronous notifications from the physical device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Attached,
    Detached,
    PermissionGranted,
    PermissionDenied,
}

/// Access to the two physical output channels plus device lifecycle.
///
/// Implementations own all transport detail. Writes are individually
/// fallible; a failed write must leave the channel usable for the next
/// attempt.
pub trait DeviceChannelPort {
    /// Open the device and initialize both channels to a safe parked
    /// state. Returns the resulting readiness.
    fn open_device(&mut self) -> Result<Readiness, ChannelError>;

    /// Release the device. Idempotent.
    fn close_device(&mut self);

    fn set_frequency(&mut self, hz: f64) -> Result<(), ChannelError>;

    fn set_amplitude(&mut self, level: u8) -> Result<(), ChannelError>;

    fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError>;

    /// Block until the device has had `ms` to settle after a mode
    /// write. Mocks may return immediately.
    fn settle(&mut self, ms: u32);

    /// Drain one pending device event, if any.
    fn poll_event(&mut self) -> Option<DeviceEvent>;
}

/// Audio sink used by the software tone fallback.
pub trait AudioOutputPort {
    /// Request exclusive playback focus. Returns false when denied.
    fn request_focus(&mut self) -> bool;

    fn release_focus(&mut self);

    /// Queue one buffer of mono i16 samples.
    fn play(&mut self, samples: &[i16]);
}

/// Identifier assigned by the session-logging collaborator.
pub type RunId = u64;

/// Parameters reported when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub frequency_hz: u32,
    pub intensity: u8,
    pub duration_secs: u32,
}

/// Live values reported alongside run events and stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub frequency_hz: u32,
    pub intensity: u8,
    pub remaining_secs: u32,
}

/// Session-logging collaborator. Failures here never stop a session.
pub trait SessionLogPort {
    fn start_run(&mut self, params: RunParams) -> Result<RunId, SessionLogError>;

    fn log_event(
        &mut self,
        run: RunId,
        kind: crate::app::events::RunEventKind,
        snapshot: RunSnapshot,
    ) -> Result<(), SessionLogError>;

    fn stop_run(
        &mut self,
        run: RunId,
        reason: crate::app::events::StopReason,
        snapshot: RunSnapshot,
    ) -> Result<(), SessionLogError>;
}

/// Outbound notifications from the core to whoever is listening.
pub trait EventSink {
    fn state(&mut self, snapshot: &crate::app::events::SessionSnapshot);

    fn error(&mut self, event: &crate::app::events::ErrorEvent);
}
