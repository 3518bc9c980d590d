//! Chip drivers for the two output channels.
//!
//! Drivers are pure word builders plus a thin write wrapper. All bus
//! access goes through [`WordBridge`], so the same drivers run against
//! the real transport and against test fakes.

pub mod ad9833;
pub mod mcp41010;

use crate::error::ChannelError;

/// 16-bit word transport to a chip-selected SPI device.
pub trait WordBridge {
    fn write_word(&mut self, cs: u8, word: u16) -> Result<(), ChannelError>;
}
