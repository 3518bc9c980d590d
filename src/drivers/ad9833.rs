//! AD9833 waveform generator driver.
//!
//! The chip takes 16-bit control and frequency words over SPI. We run
//! it in B28 mode: a 28-bit frequency value split into two 14-bit
//! writes to the FREQ0 register, LSBs first. Datasheet: AD9833 rev. D.

use log::trace;

use super::WordBridge;
use crate::app::ports::OutputMode;
use crate::error::ChannelError;

/// Master clock of the synthesizer board, Hz.
pub const MCLK_HZ: f64 = 25_000_000.0;

const REG_B28: u16 = 0x2000;
const REG_RESET: u16 = 0x0100;
const REG_SLEEP1: u16 = 0x0080;
const REG_SLEEP12: u16 = 0x0040;
const FREQ0_ADDR: u16 = 0x4000;

/// Split a frequency in Hz into the two FREQ0 register words.
pub fn frequency_words(hz: f64) -> [u16; 2] {
    // 28-bit phase increment: hz * 2^28 / MCLK.
    let word = ((hz * f64::from(1u32 << 28) / MCLK_HZ) + 0.5) as u32 & 0x0FFF_FFFF;
    let lsb = (word & 0x3FFF) as u16;
    let msb = ((word >> 14) & 0x3FFF) as u16;
    [FREQ0_ADDR | lsb, FREQ0_ADDR | msb]
}

/// Control word for the requested output mode.
///
/// Off is full shutdown: DAC and clock asleep with the output held in
/// reset, so the stage is silent, not just zero-frequency.
pub fn control_word(mode: OutputMode) -> u16 {
    match mode {
        OutputMode::Off => REG_B28 | REG_RESET | REG_SLEEP1 | REG_SLEEP12,
        OutputMode::Sine => REG_B28,
    }
}

pub struct Ad9833Channel {
    cs: u8,
}

impl Ad9833Channel {
    pub fn new(cs: u8) -> Self {
        Self { cs }
    }

    /// Put the chip into a known silent state.
    pub fn park(&self, bridge: &mut impl WordBridge) -> Result<(), ChannelError> {
        bridge.write_word(self.cs, control_word(OutputMode::Off))
    }

    /// Program FREQ0. Sends the B28 control prefix then both halves.
    pub fn set_frequency(
        &self,
        bridge: &mut impl WordBridge,
        hz: f64,
    ) -> Result<(), ChannelError> {
        trace!("ad9833 set_frequency {hz}");
        let [lsb, msb] = frequency_words(hz);
        bridge.write_word(self.cs, REG_B28)?;
        bridge.write_word(self.cs, lsb)?;
        bridge.write_word(self.cs, msb)
    }

    pub fn set_mode(
        &self,
        bridge: &mut impl WordBridge,
        mode: OutputMode,
    ) -> Result<(), ChannelError> {
        trace!("ad9833 set_mode {mode:?}");
        bridge.write_word(self.cs, control_word(mode))
    }
}
