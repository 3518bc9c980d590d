//! Software sine tone generator.
//!
//! Fallback output path used when the hardware synthesizer is
//! unavailable. Produces mono signed 16-bit PCM via a phase
//! accumulator, scaled by the current intensity. Amplitude maps
//! linearly from intensity percent, clamped to 100.

use core::f32::consts::TAU;

/// Phase-accumulator sine generator.
///
/// `fill` renders into a caller-provided buffer. Phase is carried
/// across calls so consecutive buffers are continuous.
pub struct SineTone {
    phase: f32,
    phase_inc: f32,
    volume: f32,
    sample_rate: u32,
}

impl SineTone {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 0.0,
            volume: 0.0,
            sample_rate,
        }
    }

    /// Retarget the generator. Takes effect on the next `fill`.
    pub fn set(&mut self, frequency_hz: u32, intensity: u8) {
        self.phase_inc = TAU * frequency_hz as f32 / self.sample_rate as f32;
        self.volume = intensity.min(100) as f32 / 100.0;
        if frequency_hz == 0 {
            self.phase = 0.0;
        }
    }

    /// True when the current settings would produce silence.
    pub fn is_silent(&self) -> bool {
        self.phase_inc == 0.0 || self.volume == 0.0
    }

    /// Render one buffer of mono i16 samples.
    pub fn fill(&mut self, buf: &mut [i16]) {
        if self.is_silent() {
            buf.fill(0);
            return;
        }
        for sample in buf.iter_mut() {
            let value = self.phase.sin() * self.volume * i16::MAX as f32;
            *sample = value as i16;
            self.phase += self.phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
