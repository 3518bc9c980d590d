//! SonoDrive — vibration output session controller.
//!
//! Drives an AD9833-class frequency-synthesis channel and an
//! MCP41010-class amplitude channel behind a USB word bridge,
//! reconciling a desired output state against the hardware, ramping
//! parameter transitions, falling back to a software sine tone when
//! the physical channel is unavailable, and running the session state
//! machine (idle / running / paused / soft-reducing).
//!
//! All hardware access flows through port traits defined in
//! [`app::ports`], so the entire controller is testable with mock
//! adapters and the physical bridge lives behind a narrow seam.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod ramp;
pub mod runtime;
pub mod tone;
