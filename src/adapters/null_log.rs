//! No-op session log adapter.
//!
//! Used when no logging collaborator is configured. Hands out
//! sequential run ids so the rest of the controller behaves exactly as
//! it would with a real backend.

use log::debug;

use crate::app::events::{RunEventKind, StopReason};
use crate::app::ports::{RunId, RunParams, RunSnapshot, SessionLogPort};
use crate::error::SessionLogError;

#[derive(Default)]
pub struct NullSessionLog {
    next_id: RunId,
}

impl NullSessionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionLogPort for NullSessionLog {
    fn start_run(&mut self, params: RunParams) -> Result<RunId, SessionLogError> {
        self.next_id += 1;
        debug!(
            "run {} started: {}Hz at {}% for {}s (unlogged)",
            self.next_id, params.frequency_hz, params.intensity, params.duration_secs
        );
        Ok(self.next_id)
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
        run: RunId,
        reason: StopReason,
        _snapshot: RunSnapshot,
    ) -> Result<(), SessionLogError> {
        debug!("run {run} stopped: {} (unlogged)", reason.api_value());
        Ok(())
    }
}
