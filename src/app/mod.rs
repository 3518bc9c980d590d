//! Application core: ports, intents, events and the session service.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
