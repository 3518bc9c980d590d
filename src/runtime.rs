//! Control thread runtime.
//!
//! The session core is synchronous and single-threaded by design: one
//! dedicated control thread owns the [`SessionService`] and steps it at
//! the configured tick. Everything else talks to it over static
//! `embassy-sync` channels, so no lock is ever held across a hardware
//! write.
//!
//! ```text
//! ┌──────────────┐  SessionIntent  ┌─────────────────────────┐
//! │  Embedding   │───────────────▶│  Control thread          │
//! │  application │◀───────────────│  (SessionService::tick)  │
//! └──────────────┘  Snapshot/Error └─────────────────────────┘
//! ```
//!
//! The latest snapshot is additionally mirrored into a shared cell so
//! readers can always get the current state without draining the
//! channel.

use core::cell::Cell;
use std::thread;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};

use crate::app::commands::SessionIntent;
use crate::app::events::{ErrorEvent, SessionSnapshot};
use crate::app::ports::{AudioOutputPort, DeviceChannelPort, EventSink, SessionLogPort};
use crate::app::service::SessionService;
use crate::config::ControllerConfig;
use crate::error::Error;

/// Intent queue depth. Intents arrive at human rates; 16 is plenty.
const INTENT_DEPTH: usize = 16;
const STATE_DEPTH: usize = 32;
const ERROR_DEPTH: usize = 16;

/// Inbound intent channel: application → control thread.
pub static INTENT_CHANNEL: Channel<CriticalSectionRawMutex, SessionIntent, INTENT_DEPTH> =
    Channel::new();

/// Outbound snapshot channel: control thread → application.
pub static STATE_CHANNEL: Channel<CriticalSectionRawMutex, SessionSnapshot, STATE_DEPTH> =
    Channel::new();

/// Outbound error channel: control thread → application.
pub static ERROR_CHANNEL: Channel<CriticalSectionRawMutex, ErrorEvent, ERROR_DEPTH> =
    Channel::new();

/// Always-current snapshot mirror for lock-free-ish reads.
static SNAPSHOT: BlockingMutex<CriticalSectionRawMutex, Cell<SessionSnapshot>> =
    BlockingMutex::new(Cell::new(SessionSnapshot::IDLE));

/// Event sink that fans out to the static channels.
///
/// Snapshots that would overflow the channel are dropped (the mirror
/// cell still holds the newest one); errors that overflow are dropped
/// with a log line.
pub struct ChannelEventSink;

impl EventSink for ChannelEventSink {
    fn state(&mut self, snapshot: &SessionSnapshot) {
        SNAPSHOT.lock(|cell| cell.set(*snapshot));
        if STATE_CHANNEL.try_send(*snapshot).is_err() {
            warn!("state channel full, dropping snapshot");
        }
    }

    fn error(&mut self, event: &ErrorEvent) {
        if ERROR_CHANNEL.try_send(*event).is_err() {
            warn!("error channel full, dropping event");
        }
    }
}

/// Cheap handle for talking to the control thread.
#[derive(Clone, Copy)]
pub struct ControllerHandle;

impl ControllerHandle {
    /// Queue an intent. Returns false when the queue is full.
    pub fn send_intent(&self, intent: SessionIntent) -> bool {
        INTENT_CHANNEL.try_send(intent).is_ok()
    }

    /// Current session state, never blocks on the control thread.
    pub fn latest_snapshot(&self) -> SessionSnapshot {
        SNAPSHOT.lock(|cell| cell.get())
    }

    pub fn try_recv_state(&self) -> Option<SessionSnapshot> {
        STATE_CHANNEL.try_receive().ok()
    }

    pub fn try_recv_error(&self) -> Option<ErrorEvent> {
        ERROR_CHANNEL.try_receive().ok()
    }
}

/// Validate the config and spawn the control thread.
///
/// The thread runs until a [`SessionIntent::Shutdown`] arrives. Only
/// one controller may exist per process; the channels are static.
pub fn spawn<C, A, L>(
    config: ControllerConfig,
    channel: C,
    audio: A,
    logger: L,
) -> Result<(ControllerHandle, thread::JoinHandle<()>), Error>
where
    C: DeviceChannelPort + Send + 'static,
    A: AudioOutputPort + Send + 'static,
    L: SessionLogPort + Send + 'static,
{
    config.validate().map_err(Error::Config)?;

    let join = thread::Builder::new()
        .name("session-control".into())
        .spawn(move || {
            let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
            futures_lite::future::block_on(
                executor.run(control_task(config, channel, audio, logger)),
            );
        })
        .map_err(|_| Error::Config("failed to spawn control thread"))?;

    Ok((ControllerHandle, join))
}

async fn control_task<C, A, L>(config: ControllerConfig, channel: C, audio: A, logger: L)
where
    C: DeviceChannelPort,
    A: AudioOutputPort,
    L: SessionLogPort,
{
    let tick = Duration::from_millis(u64::from(config.control_tick_ms));
    let mut service = SessionService::new(config, channel, audio, logger);
    let mut sink = ChannelEventSink;

    service.start(&mut sink);
    let epoch = Instant::now();
    info!("control loop running at {}ms tick", tick.as_millis());

    loop {
        let mut shutdown = false;
        while let Ok(intent) = INTENT_CHANNEL.try_receive() {
            if matches!(intent, SessionIntent::Shutdown) {
                shutdown = true;
            }
            let now_ms = epoch.elapsed().as_millis();
            service.handle_intent(intent, now_ms, &mut sink);
            if shutdown {
                break;
            }
        }
        if shutdown {
            break;
        }

        let now_ms = epoch.elapsed().as_millis();
        service.tick(now_ms, &mut sink);
        Timer::after(tick).await;
    }
    info!("control loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::{RunEventKind, StopReason};
    use crate::app::ports::{DeviceEvent, OutputMode, Readiness, RunId, RunParams, RunSnapshot};
    use crate::error::{ChannelError, SessionLogError};
    use crate::fsm::StateId;
    use std::time::Duration as StdDuration;

    struct ReadyChannel;

    impl DeviceChannelPort for ReadyChannel {
        fn open_device(&mut self) -> Result<Readiness, ChannelError> {
            Ok(Readiness {
                device_open: true,
                frequency_ready: true,
                amplitude_ready: true,
            })
        }
        fn close_device(&mut self) {}
        fn set_frequency(&mut self, _hz: f64) -> Result<(), ChannelError> {
            Ok(())
        }
        fn set_amplitude(&mut self, _level: u8) -> Result<(), ChannelError> {
            Ok(())
        }
        fn set_output_mode(&mut self, _mode: OutputMode) -> Result<(), ChannelError> {
            Ok(())
        }
        fn settle(&mut self, _ms: u32) {}
        fn poll_event(&mut self) -> Option<DeviceEvent> {
            None
        }
    }

    struct NoAudio;

    impl AudioOutputPort for NoAudio {
        fn request_focus(&mut self) -> bool {
            true
        }
        fn release_focus(&mut self) {}
        fn play(&mut self, _samples: &[i16]) {}
    }

    struct QuietLog;

    impl SessionLogPort for QuietLog {
        fn start_run(&mut self, _params: RunParams) -> Result<RunId, SessionLogError> {
            Ok(1)
        }
        fn log_event(
            &mut self,
            _run: RunId,
            _kind: RunEventKind,
            _snapshot: RunSnapshot,
        ) -> Result<(), SessionLogError> {
            Ok(())
        }
        fn stop_run(
            &mut self,
            _run: RunId,
            _reason: StopReason,
            _snapshot: RunSnapshot,
        ) -> Result<(), SessionLogError> {
            Ok(())
        }
    }

    fn wait_for(handle: &ControllerHandle, state: StateId) {
        let deadline = std::time::Instant::now() + StdDuration::from_secs(5);
        while handle.latest_snapshot().state != state {
            assert!(
                std::time::Instant::now() < deadline,
                "never reached {state:?}, stuck at {:?}",
                handle.latest_snapshot().state
            );
            thread::sleep(StdDuration::from_millis(10));
        }
    }

    #[test]
    fn spawn_rejects_invalid_config() {
        let config = ControllerConfig {
            control_tick_ms: 0,
            ..Default::default()
        };
        assert!(spawn(config, ReadyChannel, NoAudio, QuietLog).is_err());
    }

    // Channels are static, so only this test may drive the control
    // thread within the unit-test binary.
    #[test]
    fn control_thread_runs_a_session_end_to_end() {
        let (handle, join) =
            spawn(ControllerConfig::default(), ReadyChannel, NoAudio, QuietLog).unwrap();

        assert!(handle.send_intent(SessionIntent::SetFrequency(40)));
        assert!(handle.send_intent(SessionIntent::SetIntensity(60)));
        assert!(handle.send_intent(SessionIntent::SetDurationMinutes(5)));
        assert!(handle.send_intent(SessionIntent::Start {
            allow_software_only: false
        }));
        wait_for(&handle, StateId::Running);
        assert!(handle.latest_snapshot().hardware_ready);

        assert!(handle.send_intent(SessionIntent::Stop));
        wait_for(&handle, StateId::Idle);

        assert!(handle.send_intent(SessionIntent::Shutdown));
        join.join().unwrap();
    }
}

