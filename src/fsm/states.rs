//! State handlers and the state table.
//!
//! Handlers are plain functions over [`SessionContext`]. They never
//! touch hardware directly; outward effects travel through the
//! context's request fields, which the service applies after the tick.

use log::debug;

use super::context::SessionContext;
use super::{StateDescriptor, StateId};
use crate::app::events::StopReason;

// ---------------------------------------------------------------------------
// Idle
// ---------------------------------------------------------------------------

/// Entering Idle clears everything session-scoped. Staged parameters
/// (frequency, intensity, duration) survive so the next start reuses
/// them.
fn idle_enter(ctx: &mut SessionContext) {
    ctx.remaining_ms = 0;
    ctx.software_only = false;
    ctx.soft_original_intensity = None;
    ctx.soft_accum_ms = 0;
    ctx.intensity_request = None;
    debug!("session idle");
}

fn idle_update(_ctx: &mut SessionContext) -> Option<StateId> {
    None
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

fn running_update(ctx: &mut SessionContext) -> Option<StateId> {
    tick_countdown(ctx)
}

// ---------------------------------------------------------------------------
// Paused
// ---------------------------------------------------------------------------

/// Paused freezes the countdown. Nothing to do per tick.
fn paused_update(_ctx: &mut SessionContext) -> Option<StateId> {
    None
}

// ---------------------------------------------------------------------------
// SoftReducing
// ---------------------------------------------------------------------------

fn soft_reduce_enter(ctx: &mut SessionContext) {
    ctx.soft_original_intensity = Some(ctx.intensity);
    ctx.soft_accum_ms = 0;
    debug!("soft reduction from intensity {}", ctx.intensity);
}

fn soft_reduce_exit(ctx: &mut SessionContext) {
    ctx.soft_original_intensity = None;
    ctx.soft_accum_ms = 0;
}

/// The countdown keeps running during soft reduction. Intensity steps
/// toward the configured target on its own, slower period.
fn soft_reduce_update(ctx: &mut SessionContext) -> Option<StateId> {
    ctx.soft_accum_ms += ctx.config.control_tick_ms;
    if ctx.soft_accum_ms >= ctx.config.soft_reduce_tick_ms {
        ctx.soft_accum_ms -= ctx.config.soft_reduce_tick_ms;
        step_toward_target(ctx);
    }
    tick_countdown(ctx)
}

fn step_toward_target(ctx: &mut SessionContext) {
    let target = ctx.config.soft_reduce_target;
    let current = ctx.intensity;
    let next = if current > target {
        let delta = (u32::from(current - target) / u32::from(ctx.config.soft_reduce_divisor))
            .max(u32::from(ctx.config.soft_reduce_min_step)) as u8;
        current.saturating_sub(delta).max(target)
    } else if current < target {
        // Below target: bring the output up rather than leave it weak.
        target
    } else {
        return;
    };
    ctx.intensity = next;
    ctx.intensity_request = Some(next);
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

fn tick_countdown(ctx: &mut SessionContext) -> Option<StateId> {
    let tick = u64::from(ctx.config.control_tick_ms);
    ctx.remaining_ms = ctx.remaining_ms.saturating_sub(tick);
    if ctx.remaining_ms == 0 {
        ctx.stop_request = Some(StopReason::CountdownComplete);
        return Some(StateId::Idle);
    }
    None
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Build the complete state table. Array index must equal
/// `StateId as usize`.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: None,
            on_exit: None,
            on_update: running_update,
        },
        StateDescriptor {
            id: StateId::Paused,
            name: "Paused",
            on_enter: None,
            on_exit: None,
            on_update: paused_update,
        },
        StateDescriptor {
            id: StateId::SoftReducing,
            name: "SoftReducing",
            on_enter: Some(soft_reduce_enter),
            on_exit: Some(soft_reduce_exit),
            on_update: soft_reduce_update,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_indices_match_ids() {
        let table = build_state_table();
        for (i, desc) in table.iter().enumerate() {
            assert_eq!(desc.id as usize, i, "table row {i} out of order");
        }
    }
}
