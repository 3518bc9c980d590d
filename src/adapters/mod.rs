//! Adapters binding the application ports to concrete backends.

pub mod bridge;
pub mod log_sink;
pub mod null_log;
