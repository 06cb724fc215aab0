//! PCM stream format shared by synthesizers, the speaker and devices.
//!
//! No resampling happens anywhere in the pipeline, so every producer must
//! agree with the output device on this format exactly.

use std::time::Duration;

use hound::{SampleFormat, WavSpec};
use serde::{Deserialize, Serialize};

use crate::constants::{BIT_DEPTH, CAPTURE_SAMPLE_RATE, CHANNELS, ESPEAK_SAMPLE_RATE, SAMPLE_RATE};
use crate::error::DeviceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::mono(SAMPLE_RATE)
    }
}

impl PcmFormat {
    /// 16-bit signed mono at the given rate.
    pub fn mono(sample_rate: u32) -> Self {
        PcmFormat {
            sample_rate,
            channels: CHANNELS,
            bit_depth: BIT_DEPTH,
        }
    }

    /// Format used by the on-device streaming synthesizer.
    pub fn espeak() -> Self {
        Self::mono(ESPEAK_SAMPLE_RATE)
    }

    /// Format used for microphone capture.
    pub fn capture() -> Self {
        Self::mono(CAPTURE_SAMPLE_RATE)
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.bit_depth != BIT_DEPTH {
            return Err(DeviceError::Format(format!(
                "only {BIT_DEPTH}-bit PCM is supported, got {}-bit",
                self.bit_depth
            )));
        }
        if self.channels == 0 {
            return Err(DeviceError::Format("channel count must be at least 1".into()));
        }
        if self.sample_rate == 0 {
            return Err(DeviceError::Format("sample rate must be non-zero".into()));
        }
        Ok(())
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bit_depth as usize / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Playback duration of `bytes` bytes of PCM in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let per_second = self.bytes_per_second();
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / per_second as f64)
    }

    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format: SampleFormat::Int,
        }
    }
}
