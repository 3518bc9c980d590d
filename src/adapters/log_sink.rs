//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured session events to
//! the logger. Useful on its own for headless deployments and as the
//! default sink until a UI is attached.

use log::{info, warn};

use crate::app::events::{ErrorEvent, SessionSnapshot};
use crate::app::ports::EventSink;

/// Adapter that logs every snapshot and error to the console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn state(&mut self, snapshot: &SessionSnapshot) {
        info!(
            "STATE | {:?} | {}Hz at {}% | {}s/{}s left | hw={} tone={}{}",
            snapshot.state,
            snapshot.frequency_hz,
            snapshot.intensity,
            snapshot.remaining_secs,
            snapshot.total_duration_secs,
            if snapshot.hardware_ready { "ready" } else { "down" },
            if snapshot.tone_playing { "on" } else { "off" },
            if snapshot.soft_reducing { " (soft)" } else { "" },
        );
    }

    fn error(&mut self, event: &ErrorEvent) {
        match event {
            ErrorEvent::ChannelWriteFailure { channel, cause } => {
                warn!("ERROR | {channel:?} write failed: {cause}");
            }
            ErrorEvent::ChannelUnavailable => {
                warn!("ERROR | device channel unavailable");
            }
            ErrorEvent::RampAborted { failures } => {
                warn!("ERROR | ramp aborted after {failures} failures");
            }
            ErrorEvent::SessionLoggingFailure => {
                warn!("ERROR | session logging failed");
            }
        }
    }
}
