//! The session service: intent handling, tick orchestration, and the
//! glue between the state machine, the gateway and the ramp executor.
//!
//! One instance lives on the control thread. Every mutation of session
//! state flows through [`SessionService::handle_intent`] or
//! [`SessionService::tick`], so ordering is total: an intent handled
//! before a tick is fully applied before that tick's ramp step runs.

use log::{debug, info, warn};

use crate::app::commands::SessionIntent;
use crate::app::events::{ErrorEvent, RunEventKind, SessionSnapshot, StopReason};
use crate::app::ports::{
    AudioOutputPort, DeviceChannelPort, EventSink, RunId, RunParams, RunSnapshot, SessionLogPort,
};
use crate::config::ControllerConfig;
use crate::fsm::context::SessionContext;
use crate::fsm::{states, Fsm, StateId};
use crate::gateway::HardwareGateway;
use crate::ramp::executor::{RampState, TransitionExecutor};
use crate::ramp::{RampPlan, RampPoint, TransitionSpec};

pub struct SessionService<C, A, L> {
    fsm: Fsm,
    ctx: SessionContext,
    gateway: HardwareGateway<C, A>,
    executor: TransitionExecutor,
    logger: L,
    run_id: Option<RunId>,
    last_snapshot: SessionSnapshot,
    was_ready: bool,
}

impl<C, A, L> SessionService<C, A, L>
where
    C: DeviceChannelPort,
    A: AudioOutputPort,
    L: SessionLogPort,
{
    pub fn new(config: ControllerConfig, channel: C, audio: A, logger: L) -> Self {
        let gateway = HardwareGateway::new(channel, audio, &config);
        let executor = TransitionExecutor::new(config.ramp_failure_threshold);
        Self {
            fsm: Fsm::new(states::build_state_table(), StateId::Idle),
            ctx: SessionContext::new(config),
            gateway,
            executor,
            logger,
            run_id: None,
            last_snapshot: SessionSnapshot::IDLE,
            was_ready: false,
        }
    }

    /// One-time startup: enter the initial state and try to bring the
    /// device up. Call before the first tick.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        self.gateway.open_if_needed();
        self.ctx.hardware_ready = self.gateway.is_ready();
        self.was_ready = self.ctx.hardware_ready;
        self.publish_snapshot(sink);
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.build_snapshot()
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    pub fn handle_intent(
        &mut self,
        intent: SessionIntent,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        debug!("intent: {intent:?}");
        match intent {
            SessionIntent::Start { allow_software_only } => {
                self.handle_start(allow_software_only, sink);
            }
            SessionIntent::Stop => {
                if self.session_active() {
                    self.finalize_stop(StopReason::Manual, sink);
                }
            }
            SessionIntent::Pause => self.handle_pause(sink),
            SessionIntent::Resume => self.handle_resume(sink),
            SessionIntent::SetFrequency(hz) => {
                self.ctx.frequency_hz = hz;
                if self.output_reachable() {
                    self.gateway.apply_frequency(hz, sink);
                }
                self.maybe_log_run_event(RunEventKind::AdjustFrequency, sink);
            }
            SessionIntent::SetIntensity(level) => {
                let level = level.min(100);
                self.ctx.intensity = level;
                if self.output_reachable() {
                    self.gateway.apply_intensity(level, sink);
                }
                self.maybe_log_run_event(RunEventKind::AdjustIntensity, sink);
            }
            SessionIntent::AdjustFrequency(delta) => {
                let hz = i64::from(self.ctx.frequency_hz) + i64::from(delta);
                let hz = hz.clamp(1, i64::from(u32::MAX)) as u32;
                self.handle_intent(SessionIntent::SetFrequency(hz), now_ms, sink);
                return;
            }
            SessionIntent::AdjustIntensity(delta) => {
                let level = i64::from(self.ctx.intensity) + i64::from(delta);
                let level = level.clamp(0, 100) as u8;
                self.handle_intent(SessionIntent::SetIntensity(level), now_ms, sink);
                return;
            }
            SessionIntent::SetDurationMinutes(minutes) => {
                self.ctx.duration_minutes = minutes;
            }
            SessionIntent::AdjustTime(delta_min) => {
                if self.session_active() {
                    let delta_ms = i64::from(delta_min) * 60_000;
                    self.ctx.remaining_ms = self.ctx.remaining_ms.saturating_add_signed(delta_ms);
                    self.maybe_log_run_event(RunEventKind::AdjustTime, sink);
                } else {
                    let minutes = i64::from(self.ctx.duration_minutes) + i64::from(delta_min);
                    self.ctx.duration_minutes = minutes.clamp(0, i64::from(u32::MAX)) as u32;
                }
            }
            SessionIntent::SetToneFallback(enabled) => {
                self.ctx.tone_fallback = enabled;
                self.gateway.set_tone_fallback(enabled);
            }
            SessionIntent::TransitionToStep {
                frequency_hz,
                intensity,
                spec,
            } => self.handle_transition(frequency_hz, intensity.min(100), spec, now_ms, sink),
            SessionIntent::SoftReduce => {
                if self.state() == StateId::Running {
                    self.fsm.force_transition(StateId::SoftReducing, &mut self.ctx);
                }
            }
            SessionIntent::ResumeFromSoftReduce => self.handle_soft_resume(sink),
            SessionIntent::Logout => {
                if self.session_active() {
                    self.finalize_stop(StopReason::Logout, sink);
                }
            }
            SessionIntent::Shutdown => self.shutdown(sink),
        }
        self.publish_snapshot(sink);
    }

    /// Stop everything and release the device. The control loop exits
    /// after calling this.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) {
        if self.session_active() {
            self.finalize_stop(StopReason::Manual, sink);
        }
        self.gateway.close();
        self.ctx.hardware_ready = false;
        self.was_ready = false;
        info!("controller shut down");
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance everything by one control tick.
    ///
    /// Device events are reacted to before the ramp steps, so a
    /// readiness loss always wins over an in-flight transition.
    pub fn tick(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.gateway.process_device_events();
        let ready = self.gateway.is_ready();
        self.ctx.hardware_ready = ready;
        if self.was_ready && !ready && self.session_active() && !self.ctx.software_only {
            warn!("hardware lost mid-session");
            self.executor.cancel();
            self.finalize_stop(StopReason::HardwareError, sink);
        }
        self.was_ready = ready;

        self.fsm.tick(&mut self.ctx);

        if let Some(reason) = self.ctx.stop_request.take() {
            self.finalize_stop(reason, sink);
        }

        if let Some(level) = self.ctx.intensity_request.take() {
            self.gateway.apply_intensity(level, sink);
            self.maybe_log_run_event(RunEventKind::AdjustIntensity, sink);
        }

        if self.session_active()
            && self.executor.step(&mut self.gateway, sink, now_ms) == RampState::Aborted
        {
            self.finalize_stop(StopReason::HardwareError, sink);
        }

        self.gateway.pump_tone();
        self.publish_snapshot(sink);
    }

    // -----------------------------------------------------------------------
    // Intent handlers
    // -----------------------------------------------------------------------

    fn handle_start(&mut self, allow_software_only: bool, sink: &mut impl EventSink) {
        if self.state() != StateId::Idle {
            debug!("start ignored: session already active");
            return;
        }
        if self.ctx.frequency_hz == 0 || self.ctx.duration_minutes == 0 {
            warn!("start rejected: frequency and duration must be set");
            return;
        }

        self.gateway.open_if_needed();
        if self.gateway.is_ready() {
            self.gateway.apply_frequency(self.ctx.frequency_hz, sink);
            self.gateway.apply_intensity(self.ctx.intensity, sink);
            if self.gateway.start_output(sink).is_err() {
                warn!("start aborted: output stage unavailable");
                return;
            }
            self.ctx.software_only = false;
        } else {
            if !allow_software_only {
                warn!("start rejected: hardware not ready");
                sink.error(&ErrorEvent::ChannelUnavailable);
                return;
            }
            if !self.gateway.play_standalone_tone() {
                warn!("start aborted: audio focus denied");
                return;
            }
            self.gateway.apply_frequency(self.ctx.frequency_hz, sink);
            self.gateway.apply_intensity(self.ctx.intensity, sink);
            self.ctx.software_only = true;
        }

        let params = RunParams {
            frequency_hz: self.ctx.frequency_hz,
            intensity: self.ctx.intensity,
            duration_secs: self.ctx.duration_minutes * 60,
        };
        match self.logger.start_run(params) {
            Ok(id) => self.run_id = Some(id),
            Err(e) => {
                // Logging is best effort. The session runs regardless.
                warn!("session log start failed: {e}");
                sink.error(&ErrorEvent::SessionLoggingFailure);
                self.run_id = None;
            }
        }

        self.ctx.remaining_ms = u64::from(self.ctx.duration_minutes) * 60_000;
        self.fsm.force_transition(StateId::Running, &mut self.ctx);
        info!(
            "session started: {}Hz at {}% for {}min{}",
            self.ctx.frequency_hz,
            self.ctx.intensity,
            self.ctx.duration_minutes,
            if self.ctx.software_only { " (tone only)" } else { "" }
        );
    }

    fn handle_pause(&mut self, sink: &mut impl EventSink) {
        if !self.session_active() {
            return;
        }
        self.executor.cancel();
        if self.gateway.desired_output_active() {
            self.gateway.stop_output(sink);
        } else {
            self.gateway.stop_standalone_tone();
        }
        self.fsm.force_transition(StateId::Paused, &mut self.ctx);
        info!("session paused, {}s remaining", self.ctx.remaining_secs());
    }

    fn handle_resume(&mut self, sink: &mut impl EventSink) {
        if self.state() != StateId::Paused {
            return;
        }
        if self.ctx.software_only {
            if !self.gateway.play_standalone_tone() {
                warn!("resume failed: audio focus denied");
                return;
            }
        } else {
            self.gateway.open_if_needed();
            self.gateway.apply_frequency(self.ctx.frequency_hz, sink);
            self.gateway.apply_intensity(self.ctx.intensity, sink);
            if self.gateway.start_output(sink).is_err() {
                warn!("resume failed: output stage unavailable");
                self.finalize_stop(StopReason::HardwareError, sink);
                return;
            }
        }
        self.fsm.force_transition(StateId::Running, &mut self.ctx);
        info!("session resumed");
    }

    fn handle_transition(
        &mut self,
        frequency_hz: u32,
        intensity: u8,
        spec: Option<TransitionSpec>,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        if self.state() != StateId::Running {
            debug!("transition ignored outside Running");
            return;
        }
        let spec = spec.unwrap_or(TransitionSpec::Duration {
            duration_ms: self.ctx.config.default_transition_ms,
            tick_ms: self.ctx.config.default_transition_tick_ms,
        });
        // Ramp from what the hardware is actually outputting, which
        // mid-ramp is not the previously staged target.
        let desired = self.gateway.desired();
        let from = RampPoint {
            frequency_hz: desired.frequency_hz,
            intensity: desired.intensity,
        };
        let to = RampPoint {
            frequency_hz,
            intensity,
        };
        self.ctx.frequency_hz = frequency_hz;
        self.ctx.intensity = intensity;
        self.executor.begin(RampPlan::between(from, to, spec), now_ms);
        if from.frequency_hz != frequency_hz {
            self.maybe_log_run_event(RunEventKind::AdjustFrequency, sink);
        }
        if from.intensity != intensity {
            self.maybe_log_run_event(RunEventKind::AdjustIntensity, sink);
        }
    }

    fn handle_soft_resume(&mut self, sink: &mut impl EventSink) {
        if self.state() != StateId::SoftReducing {
            return;
        }
        let original = self.ctx.soft_original_intensity.unwrap_or(self.ctx.intensity);
        self.fsm.force_transition(StateId::Running, &mut self.ctx);
        self.ctx.intensity = original;
        self.gateway.apply_intensity(original, sink);
        self.maybe_log_run_event(RunEventKind::AdjustIntensity, sink);
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn session_active(&self) -> bool {
        !matches!(self.state(), StateId::Idle)
    }

    /// A parameter write has somewhere to land right now.
    fn output_reachable(&self) -> bool {
        self.gateway.is_ready() || self.gateway.tone_playing()
    }

    fn finalize_stop(&mut self, reason: StopReason, sink: &mut impl EventSink) {
        self.executor.cancel();
        let run_snapshot = RunSnapshot {
            frequency_hz: self.ctx.frequency_hz,
            intensity: self.ctx.intensity,
            remaining_secs: self.ctx.remaining_secs(),
        };
        if self.gateway.desired_output_active() {
            self.gateway.stop_output(sink);
        } else {
            self.gateway.stop_standalone_tone();
        }
        if let Some(run) = self.run_id.take() {
            if let Err(e) = self.logger.stop_run(run, reason, run_snapshot) {
                warn!("session log stop failed: {e}");
                sink.error(&ErrorEvent::SessionLoggingFailure);
            }
        }
        self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        info!("session stopped: {}", reason.api_value());
    }

    fn maybe_log_run_event(&mut self, kind: RunEventKind, sink: &mut impl EventSink) {
        let Some(run) = self.run_id else {
            return;
        };
        if !self.session_active() {
            return;
        }
        let snapshot = RunSnapshot {
            frequency_hz: self.ctx.frequency_hz,
            intensity: self.ctx.intensity,
            remaining_secs: self.ctx.remaining_secs(),
        };
        if let Err(e) = self.logger.log_event(run, kind, snapshot) {
            warn!("session log event failed: {e}");
            sink.error(&ErrorEvent::SessionLoggingFailure);
        }
    }

    fn build_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            frequency_hz: self.ctx.frequency_hz,
            intensity: self.ctx.intensity,
            remaining_secs: self.ctx.remaining_secs(),
            total_duration_secs: self.ctx.duration_minutes * 60,
            hardware_ready: self.ctx.hardware_ready,
            tone_playing: self.gateway.tone_playing(),
            soft_reducing: self.state() == StateId::SoftReducing,
        }
    }

    fn publish_snapshot(&mut self, sink: &mut impl EventSink) {
        let snapshot = self.build_snapshot();
        if snapshot != self.last_snapshot {
            self.last_snapshot = snapshot;
            sink.state(&snapshot);
        }
    }
}
