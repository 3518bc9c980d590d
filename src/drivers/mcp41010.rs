//! MCP41010 digital potentiometer driver.
//!
//! Single-channel 256-step pot controlling the output amplitude. One
//! 16-bit word per update: command byte 0x11 (write data, pot 0)
//! followed by the wiper value.

use log::trace;

use super::WordBridge;
use crate::error::ChannelError;

const CMD_WRITE_POT0: u16 = 0x11;

/// Build the 16-bit command word for a wiper value.
pub fn command_word(value: u8) -> u16 {
    (CMD_WRITE_POT0 << 8) | u16::from(value)
}

/// Map intensity percent to a wiper position.
pub fn wiper_for_percent(percent: u8) -> u8 {
    let clamped = u16::from(percent.min(100));
    ((clamped * 255) / 100) as u8
}

pub struct Mcp41010Channel {
    cs: u8,
}

impl Mcp41010Channel {
    pub fn new(cs: u8) -> Self {
        Self { cs }
    }

    pub fn set_value(&self, bridge: &mut impl WordBridge, value: u8) -> Result<(), ChannelError> {
        trace!("mcp41010 set_value {value}");
        bridge.write_word(self.cs, command_word(value))
    }

    pub fn set_percent(
        &self,
        bridge: &mut impl WordBridge,
        percent: u8,
    ) -> Result<(), ChannelError> {
        self.set_value(bridge, wiper_for_percent(percent))
    }
}
