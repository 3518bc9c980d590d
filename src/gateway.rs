//! Hardware gateway: desired/applied state reconciliation for the two
//! physical output channels.
//!
//! All output flows through here. The gateway tracks what the caller
//! wants (`DesiredState`) and what was last successfully written
//! (`AppliedState`), and skips writes whose value matches the applied
//! state. A failed write leaves the applied value unset so the next
//! attempt retries unconditionally.
//!
//! The gateway also owns the software tone fallback: when enabled it
//! mirrors the hardware output through the audio port, and in
//! software-only sessions it is the only output path.

use log::{debug, info, warn};

use crate::app::events::{ChannelKind, ErrorEvent};
use crate::app::ports::{
    AudioOutputPort, DeviceChannelPort, DeviceEvent, EventSink, OutputMode, Readiness,
};
use crate::config::ControllerConfig;
use crate::error::ChannelError;
use crate::tone::SineTone;

/// Samples rendered per tone pump.
const TONE_CHUNK: usize = 1024;

/// What the session layer wants the outputs to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DesiredState {
    pub frequency_hz: u32,
    pub intensity: u8,
    pub output_enabled: bool,
    pub tone_fallback: bool,
}

/// Last values known to have reached the hardware. `None` means
/// unknown, which forces the next write through.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct AppliedState {
    frequency: Option<f64>,
    intensity: Option<u8>,
    mode: OutputMode,
}

impl AppliedState {
    const UNSET: Self = Self {
        frequency: None,
        intensity: None,
        mode: OutputMode::Off,
    };
}

/// Result of one reconciled parameter write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Value already applied, no write issued.
    Skipped,
    /// Write issued and acknowledged.
    Applied,
    /// Write issued and failed. Applied state is now unset.
    Failed(ChannelError),
}

impl ApplyOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

pub struct HardwareGateway<C, A> {
    channel: C,
    audio: A,
    mode_settle_ms: u32,
    desired: DesiredState,
    applied: AppliedState,
    readiness: Readiness,
    tone: SineTone,
    tone_active: bool,
    audio_focus: bool,
}

impl<C: DeviceChannelPort, A: AudioOutputPort> HardwareGateway<C, A> {
    pub fn new(channel: C, audio: A, config: &ControllerConfig) -> Self {
        Self {
            channel,
            audio,
            mode_settle_ms: config.mode_settle_ms,
            desired: DesiredState::default(),
            applied: AppliedState::UNSET,
            readiness: Readiness::default(),
            tone: SineTone::new(config.tone_sample_rate_hz),
            tone_active: false,
            audio_focus: false,
        }
    }

    // -----------------------------------------------------------------------
    // Device lifecycle
    // -----------------------------------------------------------------------

    /// Try to open the device and initialize both channels. Safe to
    /// call when already open. On success the applied state is reset:
    /// the hardware was reinitialized, nothing can be assumed written.
    pub fn open_if_needed(&mut self) -> Readiness {
        if self.readiness.ready() {
            return self.readiness;
        }
        match self.channel.open_device() {
            Ok(readiness) => {
                self.readiness = readiness;
                self.applied = AppliedState::UNSET;
                if readiness.ready() {
                    info!("device open, channels initialized");
                } else {
                    debug!("device open attempt left readiness {readiness:?}");
                }
            }
            Err(e) => {
                debug!("device open failed: {e}");
                self.readiness = Readiness::default();
            }
        }
        self.readiness
    }

    /// Drain pending device events and react. Returns true when
    /// readiness changed.
    pub fn process_device_events(&mut self) -> bool {
        let before = self.readiness;
        while let Some(event) = self.channel.poll_event() {
            match event {
                DeviceEvent::Attached | DeviceEvent::PermissionGranted => {
                    info!("device event: {event:?}");
                    self.open_if_needed();
                }
                DeviceEvent::Detached | DeviceEvent::PermissionDenied => {
                    warn!("device event: {event:?}");
                    self.channel.close_device();
                    self.readiness = Readiness::default();
                    self.applied = AppliedState::UNSET;
                }
            }
        }
        if self.readiness.ready() != before.ready() && !self.readiness.ready() {
            // Hardware went away mid-whatever. The tone must not keep
            // playing a session the hardware no longer backs.
            self.stop_tone();
        }
        self.readiness != before
    }

    pub fn close(&mut self) {
        self.stop_tone();
        self.channel.close_device();
        self.readiness = Readiness::default();
        self.applied = AppliedState::UNSET;
        self.desired.output_enabled = false;
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.ready()
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    pub fn desired_output_active(&self) -> bool {
        self.desired.output_enabled
    }

    /// True while anything is producing output, hardware or tone.
    pub fn output_active(&self) -> bool {
        self.desired.output_enabled || self.tone_active
    }

    pub fn tone_playing(&self) -> bool {
        self.tone_active
    }

    pub fn set_tone_fallback(&mut self, enabled: bool) {
        self.desired.tone_fallback = enabled;
        if enabled && self.desired.output_enabled {
            self.start_tone();
        } else if !enabled && self.desired.output_enabled {
            self.stop_tone();
        }
    }

    // -----------------------------------------------------------------------
    // Parameter writes
    // -----------------------------------------------------------------------

    /// Reconcile the frequency channel to `hz`.
    pub fn apply_frequency(&mut self, hz: u32, sink: &mut impl EventSink) -> ApplyOutcome {
        self.desired.frequency_hz = hz;
        self.refresh_tone();

        if !self.readiness.ready() {
            // Tone-only sessions have no hardware to update.
            if self.tone_active {
                return ApplyOutcome::Applied;
            }
            return self.unavailable(sink);
        }
        let value = f64::from(hz);
        if self.applied.frequency == Some(value) {
            return ApplyOutcome::Skipped;
        }
        match self.channel.set_frequency(value) {
            Ok(()) => {
                self.applied.frequency = Some(value);
                // The synthesizer wakes on a frequency write. Park it
                // again if output is supposed to be off.
                if !self.desired.output_enabled {
                    self.force_mode_off(sink);
                }
                ApplyOutcome::Applied
            }
            Err(e) => self.write_failed(ChannelKind::Frequency, e, sink),
        }
    }

    /// Reconcile the amplitude channel to `level`.
    pub fn apply_intensity(&mut self, level: u8, sink: &mut impl EventSink) -> ApplyOutcome {
        self.desired.intensity = level;
        self.refresh_tone();

        if !self.readiness.ready() {
            if self.tone_active {
                return ApplyOutcome::Applied;
            }
            return self.unavailable(sink);
        }
        if self.applied.intensity == Some(level) {
            return ApplyOutcome::Skipped;
        }
        match self.channel.set_amplitude(level) {
            Ok(()) => {
                self.applied.intensity = Some(level);
                ApplyOutcome::Applied
            }
            Err(e) => self.write_failed(ChannelKind::Amplitude, e, sink),
        }
    }

    // -----------------------------------------------------------------------
    // Output gating
    // -----------------------------------------------------------------------

    /// Enable the output stage. Always performs the two-step entry:
    /// an explicit OFF write, a settle period, then SINE. The OFF step
    /// runs even when the stage is believed off so mode entry never
    /// depends on stale applied state.
    pub fn start_output(&mut self, sink: &mut impl EventSink) -> Result<(), ChannelError> {
        if !self.readiness.ready() {
            sink.error(&ErrorEvent::ChannelUnavailable);
            return Err(ChannelError::Unavailable);
        }
        self.channel
            .set_output_mode(OutputMode::Off)
            .and_then(|()| {
                self.channel.settle(self.mode_settle_ms);
                self.channel.set_output_mode(OutputMode::Sine)
            })
            .map_err(|e| {
                self.applied.mode = OutputMode::Off;
                self.emit_write_failure(ChannelKind::Mode, e, sink);
                e
            })?;
        self.applied.mode = OutputMode::Sine;
        self.desired.output_enabled = true;
        if self.desired.tone_fallback {
            self.start_tone();
        }
        info!("output enabled");
        Ok(())
    }

    /// Disable the output stage with a single OFF write.
    pub fn stop_output(&mut self, sink: &mut impl EventSink) {
        self.desired.output_enabled = false;
        self.stop_tone();
        if !self.readiness.ready() {
            return;
        }
        match self.channel.set_output_mode(OutputMode::Off) {
            Ok(()) => {
                self.applied.mode = OutputMode::Off;
                info!("output disabled");
            }
            Err(e) => {
                self.applied.mode = OutputMode::Off;
                self.emit_write_failure(ChannelKind::Mode, e, sink);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Software tone
    // -----------------------------------------------------------------------

    /// Start the tone as the sole output (software-only session).
    pub fn play_standalone_tone(&mut self) -> bool {
        self.start_tone()
    }

    pub fn stop_standalone_tone(&mut self) {
        self.stop_tone();
    }

    /// Render and queue one chunk of tone audio. Call once per tick.
    pub fn pump_tone(&mut self) {
        if !self.tone_active {
            return;
        }
        let mut buf = [0i16; TONE_CHUNK];
        self.tone.fill(&mut buf);
        self.audio.play(&buf);
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn start_tone(&mut self) -> bool {
        if !self.audio_focus {
            if !self.audio.request_focus() {
                warn!("audio focus denied, tone unavailable");
                return false;
            }
            self.audio_focus = true;
        }
        self.tone
            .set(self.desired.frequency_hz, self.desired.intensity);
        self.tone_active = true;
        true
    }

    fn stop_tone(&mut self) {
        if self.tone_active {
            self.tone.set(0, 0);
            self.tone_active = false;
        }
        if self.audio_focus {
            self.audio.release_focus();
            self.audio_focus = false;
        }
    }

    fn refresh_tone(&mut self) {
        if self.tone_active {
            self.tone
                .set(self.desired.frequency_hz, self.desired.intensity);
        }
    }

    fn force_mode_off(&mut self, sink: &mut impl EventSink) {
        match self.channel.set_output_mode(OutputMode::Off) {
            Ok(()) => self.applied.mode = OutputMode::Off,
            Err(e) => self.emit_write_failure(ChannelKind::Mode, e, sink),
        }
    }

    fn unavailable(&mut self, sink: &mut impl EventSink) -> ApplyOutcome {
        sink.error(&ErrorEvent::ChannelUnavailable);
        ApplyOutcome::Failed(ChannelError::Unavailable)
    }

    fn write_failed(
        &mut self,
        kind: ChannelKind,
        e: ChannelError,
        sink: &mut impl EventSink,
    ) -> ApplyOutcome {
        // Unset so the retry does not get skipped by change detection.
        match kind {
            ChannelKind::Frequency => self.applied.frequency = None,
            ChannelKind::Amplitude => self.applied.intensity = None,
            ChannelKind::Mode => {}
        }
        self.emit_write_failure(kind, e, sink);
        ApplyOutcome::Failed(e)
    }

    fn emit_write_failure(&self, kind: ChannelKind, e: ChannelError, sink: &mut impl EventSink) {
        warn!("{kind:?} write failed: {e}");
        let event = match e {
            ChannelError::Unavailable => ErrorEvent::ChannelUnavailable,
            ChannelError::WriteFailed(cause) => ErrorEvent::ChannelWriteFailure {
                channel: kind,
                cause,
            },
        };
        sink.error(&event);
    }
}

#[cfg(test)]
impl<C, A> HardwareGateway<C, A> {
    pub(crate) fn channel(&self) -> &C {
        &self.channel
    }

    pub(crate) fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::SessionSnapshot;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Call {
        Open,
        Close,
        Frequency(f64),
        Amplitude(u8),
        Mode(OutputMode),
        Settle(u32),
    }

    struct FakeChannel {
        calls: Vec<Call>,
        events: std::collections::VecDeque<DeviceEvent>,
        open_ok: bool,
        fail_frequency: bool,
        fail_amplitude: bool,
    }

    impl FakeChannel {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                events: std::collections::VecDeque::new(),
                open_ok: true,
                fail_frequency: false,
                fail_amplitude: false,
            }
        }
    }

    impl DeviceChannelPort for FakeChannel {
        fn open_device(&mut self) -> Result<Readiness, ChannelError> {
            self.calls.push(Call::Open);
            if self.open_ok {
                Ok(Readiness {
                    device_open: true,
                    frequency_ready: true,
                    amplitude_ready: true,
                })
            } else {
                Err(ChannelError::Unavailable)
            }
        }

        fn close_device(&mut self) {
            self.calls.push(Call::Close);
        }

        fn set_frequency(&mut self, hz: f64) -> Result<(), ChannelError> {
            self.calls.push(Call::Frequency(hz));
            if self.fail_frequency {
                Err(ChannelError::WriteFailed("transfer"))
            } else {
                Ok(())
            }
        }

        fn set_amplitude(&mut self, level: u8) -> Result<(), ChannelError> {
            self.calls.push(Call::Amplitude(level));
            if self.fail_amplitude {
                Err(ChannelError::WriteFailed("transfer"))
            } else {
                Ok(())
            }
        }

        fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError> {
            self.calls.push(Call::Mode(mode));
            Ok(())
        }

        fn settle(&mut self, ms: u32) {
            self.calls.push(Call::Settle(ms));
        }

        fn poll_event(&mut self) -> Option<DeviceEvent> {
            self.events.pop_front()
        }
    }

    struct FakeAudio {
        focus: bool,
        focus_calls: u32,
        release_calls: u32,
        buffers: u32,
        grant_focus: bool,
    }

    impl FakeAudio {
        fn new() -> Self {
            Self {
                focus: false,
                focus_calls: 0,
                release_calls: 0,
                buffers: 0,
                grant_focus: true,
            }
        }
    }

    impl AudioOutputPort for FakeAudio {
        fn request_focus(&mut self) -> bool {
            self.focus_calls += 1;
            self.focus = self.grant_focus;
            self.grant_focus
        }

        fn release_focus(&mut self) {
            self.release_calls += 1;
            self.focus = false;
        }

        fn play(&mut self, _samples: &[i16]) {
            self.buffers += 1;
        }
    }

    #[derive(Default)]
    struct TestSink {
        errors: Vec<ErrorEvent>,
    }

    impl EventSink for TestSink {
        fn state(&mut self, _snapshot: &SessionSnapshot) {}

        fn error(&mut self, event: &ErrorEvent) {
            self.errors.push(*event);
        }
    }

    fn ready_gateway() -> HardwareGateway<FakeChannel, FakeAudio> {
        let mut gw = HardwareGateway::new(
            FakeChannel::new(),
            FakeAudio::new(),
            &ControllerConfig::default(),
        );
        gw.open_if_needed();
        assert!(gw.is_ready());
        gw
    }

    #[test]
    fn duplicate_frequency_skipped() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        assert_eq!(gw.apply_frequency(40, &mut sink), ApplyOutcome::Applied);
        assert_eq!(gw.apply_frequency(40, &mut sink), ApplyOutcome::Skipped);
        let writes = gw
            .channel
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Frequency(_)))
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn duplicate_intensity_skipped() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        assert_eq!(gw.apply_intensity(50, &mut sink), ApplyOutcome::Applied);
        assert_eq!(gw.apply_intensity(50, &mut sink), ApplyOutcome::Skipped);
        let writes = gw
            .channel
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Amplitude(_)))
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn failed_write_retries_next_time() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.channel.fail_amplitude = true;
        assert!(gw.apply_intensity(50, &mut sink).is_failure());
        assert_eq!(sink.errors.len(), 1);

        gw.channel.fail_amplitude = false;
        assert_eq!(gw.apply_intensity(50, &mut sink), ApplyOutcome::Applied);
        let writes = gw
            .channel
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Amplitude(_)))
            .count();
        assert_eq!(writes, 2);
    }

    #[test]
    fn start_output_two_step_entry() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.channel.calls.clear();
        gw.start_output(&mut sink).unwrap();
        assert_eq!(
            gw.channel.calls,
            vec![
                Call::Mode(OutputMode::Off),
                Call::Settle(5),
                Call::Mode(OutputMode::Sine),
            ]
        );
    }

    #[test]
    fn start_output_two_step_even_when_believed_off() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.start_output(&mut sink).unwrap();
        gw.stop_output(&mut sink);
        gw.channel.calls.clear();

        gw.start_output(&mut sink).unwrap();
        assert!(matches!(gw.channel.calls[0], Call::Mode(OutputMode::Off)));
    }

    #[test]
    fn stop_output_single_off() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.start_output(&mut sink).unwrap();
        gw.channel.calls.clear();
        gw.stop_output(&mut sink);
        assert_eq!(gw.channel.calls, vec![Call::Mode(OutputMode::Off)]);
    }

    #[test]
    fn frequency_write_parks_mode_while_output_off() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.channel.calls.clear();
        gw.apply_frequency(40, &mut sink);
        assert_eq!(
            gw.channel.calls,
            vec![Call::Frequency(40.0), Call::Mode(OutputMode::Off)]
        );
    }

    #[test]
    fn frequency_write_leaves_mode_alone_while_running() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.start_output(&mut sink).unwrap();
        gw.channel.calls.clear();
        gw.apply_frequency(40, &mut sink);
        assert_eq!(gw.channel.calls, vec![Call::Frequency(40.0)]);
    }

    #[test]
    fn not_ready_writes_fail_unavailable() {
        let mut channel = FakeChannel::new();
        channel.open_ok = false;
        let mut gw =
            HardwareGateway::new(channel, FakeAudio::new(), &ControllerConfig::default());
        gw.open_if_needed();
        let mut sink = TestSink::default();
        assert_eq!(
            gw.apply_frequency(40, &mut sink),
            ApplyOutcome::Failed(ChannelError::Unavailable)
        );
        assert_eq!(sink.errors, vec![ErrorEvent::ChannelUnavailable]);
    }

    #[test]
    fn detach_resets_applied_state() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.apply_frequency(40, &mut sink);

        gw.channel.events.push_back(DeviceEvent::Detached);
        assert!(gw.process_device_events());
        assert!(!gw.is_ready());

        gw.channel.events.push_back(DeviceEvent::Attached);
        assert!(gw.process_device_events());
        assert!(gw.is_ready());

        // Same value must be rewritten: the device was reinitialized.
        gw.channel.calls.clear();
        assert_eq!(gw.apply_frequency(40, &mut sink), ApplyOutcome::Applied);
    }

    #[test]
    fn standalone_tone_acquires_and_releases_focus() {
        let mut gw = HardwareGateway::new(
            FakeChannel::new(),
            FakeAudio::new(),
            &ControllerConfig::default(),
        );
        let mut sink = TestSink::default();
        gw.apply_frequency(40, &mut sink);
        gw.apply_intensity(60, &mut sink);
        assert!(gw.play_standalone_tone());
        assert!(gw.tone_playing());
        gw.pump_tone();
        assert_eq!(gw.audio.buffers, 1);

        gw.stop_standalone_tone();
        assert!(!gw.tone_playing());
        assert_eq!(gw.audio.focus_calls, 1);
        assert_eq!(gw.audio.release_calls, 1);
    }

    #[test]
    fn tone_denied_without_focus() {
        let mut audio = FakeAudio::new();
        audio.grant_focus = false;
        let mut gw =
            HardwareGateway::new(FakeChannel::new(), audio, &ControllerConfig::default());
        assert!(!gw.play_standalone_tone());
        assert!(!gw.tone_playing());
    }

    #[test]
    fn detach_stops_tone() {
        let mut gw = ready_gateway();
        let mut sink = TestSink::default();
        gw.set_tone_fallback(true);
        gw.apply_frequency(40, &mut sink);
        gw.apply_intensity(60, &mut sink);
        gw.start_output(&mut sink).unwrap();
        assert!(gw.tone_playing());

        gw.channel.events.push_back(DeviceEvent::Detached);
        gw.process_device_events();
        assert!(!gw.tone_playing());
    }
}
