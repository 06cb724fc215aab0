//! Dependency-free synthesizer that "speaks" text as sine tones.
//!
//! Every letter becomes a short beep whose pitch depends on the character,
//! word gaps become silence. Like real streaming engines it only renders
//! complete words and keeps a trailing partial word until more text or a
//! flush arrives.

use crate::chunk::AudioChunk;
use crate::constants::CHUNK_FRAMES;
use crate::error::SynthesisError;
use crate::format::PcmFormat;
use crate::synth::{chunk_samples, Synthesizer};

const AMPLITUDE: f64 = 0.3; // 30% amplitude
const BASE_FREQUENCY: f64 = 220.0;
const TONE_MILLIS: usize = 60;
const GAP_MILLIS: usize = 120;

pub struct ToneSynthesizer {
    format: PcmFormat,
    chunk_frames: usize,
    pending: String,
}

impl ToneSynthesizer {
    pub fn new(format: PcmFormat) -> Self {
        ToneSynthesizer {
            format,
            chunk_frames: CHUNK_FRAMES,
            pending: String::new(),
        }
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames.max(1);
        self
    }

    /// Text held back waiting for a word boundary.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn frames(&self, millis: usize) -> usize {
        self.format.sample_rate as usize * millis / 1000
    }

    fn render(&self, text: &str) -> Vec<AudioChunk> {
        let channels = self.format.channels as usize;
        let mut samples = Vec::new();

        for c in text.chars() {
            if c.is_whitespace() {
                samples.resize(samples.len() + self.frames(GAP_MILLIS) * channels, 0);
                continue;
            }

            let frequency = pitch(c);
            // Initialize a phase variable to keep track of the sine wave phase
            let mut phase = 0.0;
            for _ in 0..self.frames(TONE_MILLIS) {
                let sample = sine_wave(phase);
                for _ in 0..channels {
                    samples.push(sample);
                }

                // Increment the phase by the frequency divided by the sample rate
                phase += frequency / self.format.sample_rate as f64;

                // Wrap the phase around 1.0 to avoid overflow
                phase %= 1.0;
            }
        }

        chunk_samples(&samples, self.chunk_frames, &self.format)
    }
}

impl Synthesizer for ToneSynthesizer {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError> {
        self.pending.push_str(text);

        // Render up to and including the last word boundary
        let Some(boundary) = self.pending.rfind(char::is_whitespace) else {
            return Ok(vec![]);
        };
        let split = boundary
            + self.pending[boundary..]
                .chars()
                .next()
                .map_or(0, char::len_utf8);

        let complete: String = self.pending.drain(..split).collect();
        Ok(self.render(&complete))
    }

    fn flush(&mut self) -> Result<Vec<AudioChunk>, SynthesisError> {
        let rest = std::mem::take(&mut self.pending);
        Ok(self.render(&rest))
    }
}

/// Map a character onto two octaves of semitones above the base frequency.
fn pitch(c: char) -> f64 {
    let step = (c.to_ascii_lowercase() as u32 % 24) as f64;
    BASE_FREQUENCY * 2f64.powf(step / 12.0)
}

// Define a helper function to generate a sine wave sample given a phase
fn sine_wave(phase: f64) -> i16 {
    // Convert the phase to radians and take the sine
    let sample = (phase * std::f64::consts::PI * 2.0).sin();
    // Scale the sample by the amplitude and the maximum value of i16
    let amplitude = i16::MAX as f64 * AMPLITUDE;
    (sample * amplitude) as i16
}
