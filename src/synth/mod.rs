//! Speech synthesizer abstraction.
//!
//! All synthesizers implement the `Synthesizer` trait, which turns text
//! fragments into PCM chunks in the synthesizer's native format.

#[cfg(feature = "espeak")]
pub mod espeak;
pub mod tone;

pub use tone::ToneSynthesizer;

use crate::chunk::AudioChunk;
use crate::error::SynthesisError;
use crate::format::PcmFormat;

/// Streaming text-to-speech engine.
///
/// Engines may hold back partial words or sentences between calls; whatever
/// they buffered must come out of [`Synthesizer::flush`] at the end of an
/// utterance.
pub trait Synthesizer: Send {
    /// Format of every chunk this synthesizer produces.
    fn format(&self) -> PcmFormat;

    /// Synthesize one text fragment. May return no chunks at all.
    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError>;

    /// Emit audio for any text still buffered.
    fn flush(&mut self) -> Result<Vec<AudioChunk>, SynthesisError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn format(&self) -> PcmFormat {
        (**self).format()
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError> {
        (**self).synthesize(text)
    }

    fn flush(&mut self) -> Result<Vec<AudioChunk>, SynthesisError> {
        (**self).flush()
    }
}

/// Split samples into chunks of at most `chunk_frames` frames.
pub(crate) fn chunk_samples(samples: &[i16], chunk_frames: usize, format: &PcmFormat) -> Vec<AudioChunk> {
    let per_chunk = (chunk_frames * format.channels as usize).max(1);
    samples
        .chunks(per_chunk)
        .map(AudioChunk::from_samples)
        .collect()
}
