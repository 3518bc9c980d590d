//! Unified error types for the session controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the control loop's error handling uniform. All variants are `Copy`
//! so they can be cheaply passed through the state machine and event
//! sinks without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A physical channel write failed or the device is unavailable.
    Channel(ChannelError),
    /// A ramp could not run to completion.
    Ramp(RampError),
    /// The session-logging collaborator failed (never fatal).
    SessionLog(SessionLogError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Ramp(e) => write!(f, "ramp: {e}"),
            Self::SessionLog(e) => write!(f, "session log: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Physical channel errors
// ---------------------------------------------------------------------------

/// Failures from the device channel adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Device not open or the target channel not initialized.
    Unavailable,
    /// A single physical write failed. The tag names the bridge-level
    /// cause (transfer error, chip rejected word, ...).
    WriteFailed(&'static str),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "device channel unavailable"),
            Self::WriteFailed(cause) => write!(f, "write failed: {cause}"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Ramp errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampError {
    /// The consecutive-failure threshold was exceeded mid-ramp.
    /// Callers treat this as a hardware error requiring session stop.
    Aborted { failures: u8 },
}

impl fmt::Display for RampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { failures } => {
                write!(f, "aborted after {failures} consecutive failures")
            }
        }
    }
}

impl From<RampError> for Error {
    fn from(e: RampError) -> Self {
        Self::Ramp(e)
    }
}

// ---------------------------------------------------------------------------
// Session-logging errors (non-fatal by policy)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLogError {
    /// Collaborator unreachable (network down, service stopped).
    Unavailable,
    /// Collaborator rejected the call.
    Rejected(&'static str),
}

impl fmt::Display for SessionLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "collaborator unavailable"),
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
        }
    }
}

impl From<SessionLogError> for Error {
    fn from(e: SessionLogError) -> Self {
        Self::SessionLog(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
