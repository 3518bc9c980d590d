//! Device channel adapter over a word-level USB bridge.
//!
//! Binds the two chip drivers to a [`UsbBridge`] transport and exposes
//! them as one [`DeviceChannelPort`]. Chip selects: 0 = synthesizer,
//! 1 = potentiometer.

use log::{debug, warn};

use crate::app::ports::{DeviceChannelPort, DeviceEvent, OutputMode, Readiness};
use crate::drivers::ad9833::Ad9833Channel;
use crate::drivers::mcp41010::Mcp41010Channel;
use crate::drivers::WordBridge;
use crate::error::ChannelError;

const CS_SYNTH: u8 = 0;
const CS_POT: u8 = 1;

/// Word transport plus device lifecycle, implemented by the real USB
/// bridge in production and by fakes in tests.
pub trait UsbBridge: WordBridge {
    fn open(&mut self) -> Result<(), ChannelError>;
    fn close(&mut self);
    fn poll_event(&mut self) -> Option<DeviceEvent>;
    fn settle(&mut self, ms: u32);
}

pub struct BridgeChannelAdapter<B> {
    bridge: B,
    synth: Ad9833Channel,
    pot: Mcp41010Channel,
    readiness: Readiness,
}

impl<B: UsbBridge> BridgeChannelAdapter<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            synth: Ad9833Channel::new(CS_SYNTH),
            pot: Mcp41010Channel::new(CS_POT),
            readiness: Readiness::default(),
        }
    }
}

impl<B: UsbBridge> DeviceChannelPort for BridgeChannelAdapter<B> {
    /// Open the transport and bring both chips to a safe parked state:
    /// wiper at zero, synthesizer asleep. Each channel is marked ready
    /// only after its init write succeeds.
    fn open_device(&mut self) -> Result<Readiness, ChannelError> {
        if self.readiness.device_open {
            return Ok(self.readiness);
        }
        self.bridge.open()?;
        self.readiness.device_open = true;

        match self.pot.set_value(&mut self.bridge, 0) {
            Ok(()) => self.readiness.amplitude_ready = true,
            Err(e) => {
                warn!("amplitude channel init failed: {e}");
                self.readiness.amplitude_ready = false;
            }
        }
        match self.synth.park(&mut self.bridge) {
            Ok(()) => self.readiness.frequency_ready = true,
            Err(e) => {
                warn!("frequency channel init failed: {e}");
                self.readiness.frequency_ready = false;
            }
        }
        debug!("device opened, readiness {:?}", self.readiness);
        Ok(self.readiness)
    }

    fn close_device(&mut self) {
        if self.readiness.device_open {
            // Best effort: park the output before letting go.
            let _ = self.synth.park(&mut self.bridge);
            let _ = self.pot.set_value(&mut self.bridge, 0);
            self.bridge.close();
        }
        self.readiness = Readiness::default();
    }

    fn set_frequency(&mut self, hz: f64) -> Result<(), ChannelError> {
        if !self.readiness.frequency_ready {
            return Err(ChannelError::Unavailable);
        }
        self.synth.set_frequency(&mut self.bridge, hz)
    }

    fn set_amplitude(&mut self, level: u8) -> Result<(), ChannelError> {
        if !self.readiness.amplitude_ready {
            return Err(ChannelError::Unavailable);
        }
        self.pot.set_percent(&mut self.bridge, level)
    }

    fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError> {
        if !self.readiness.frequency_ready {
            return Err(ChannelError::Unavailable);
        }
        self.synth.set_mode(&mut self.bridge, mode)
    }

    fn settle(&mut self, ms: u32) {
        self.bridge.settle(ms);
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.bridge.poll_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ad9833;
    use crate::drivers::mcp41010;

    #[derive(Default)]
    struct FakeBridge {
        open: bool,
        words: Vec<(u8, u16)>,
        fail_cs: Option<u8>,
    }

    impl WordBridge for FakeBridge {
        fn write_word(&mut self, cs: u8, word: u16) -> Result<(), ChannelError> {
            if self.fail_cs == Some(cs) {
                return Err(ChannelError::WriteFailed("transfer"));
            }
            self.words.push((cs, word));
            Ok(())
        }
    }

    impl UsbBridge for FakeBridge {
        fn open(&mut self) -> Result<(), ChannelError> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn poll_event(&mut self) -> Option<DeviceEvent> {
            None
        }

        fn settle(&mut self, _ms: u32) {}
    }

    #[test]
    fn open_parks_both_chips() {
        let mut adapter = BridgeChannelAdapter::new(FakeBridge::default());
        let readiness = adapter.open_device().unwrap();
        assert!(readiness.ready());
        assert!(adapter
            .bridge
            .words
            .contains(&(CS_POT, mcp41010::command_word(0))));
        assert!(adapter.bridge.words.contains(&(
            CS_SYNTH,
            ad9833::control_word(OutputMode::Off)
        )));
    }

    #[test]
    fn pot_failure_leaves_frequency_usable() {
        let mut adapter = BridgeChannelAdapter::new(FakeBridge {
            fail_cs: Some(CS_POT),
            ..FakeBridge::default()
        });
        let readiness = adapter.open_device().unwrap();
        assert!(!readiness.amplitude_ready);
        assert!(readiness.frequency_ready);
        assert!(!readiness.ready());

        assert_eq!(adapter.set_amplitude(50), Err(ChannelError::Unavailable));
        assert!(adapter.set_frequency(40.0).is_ok());
    }

    #[test]
    fn set_frequency_writes_three_words_to_synth() {
        let mut adapter = BridgeChannelAdapter::new(FakeBridge::default());
        adapter.open_device().unwrap();
        adapter.bridge.words.clear();
        adapter.set_frequency(40.0).unwrap();
        assert_eq!(adapter.bridge.words.len(), 3);
        assert!(adapter.bridge.words.iter().all(|(cs, _)| *cs == CS_SYNTH));
    }

    #[test]
    fn set_amplitude_maps_percent_to_wiper() {
        let mut adapter = BridgeChannelAdapter::new(FakeBridge::default());
        adapter.open_device().unwrap();
        adapter.bridge.words.clear();
        adapter.set_amplitude(100).unwrap();
        assert_eq!(
            adapter.bridge.words,
            vec![(CS_POT, mcp41010::command_word(255))]
        );
    }

    #[test]
    fn close_parks_before_release() {
        let mut adapter = BridgeChannelAdapter::new(FakeBridge::default());
        adapter.open_device().unwrap();
        adapter.bridge.words.clear();
        adapter.close_device();
        assert!(!adapter.bridge.open);
        assert!(!adapter.bridge.words.is_empty());
    }
}
