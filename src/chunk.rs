//! Immutable PCM byte buffers moved through the pipeline as a unit.

use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use bytes::Bytes;

use crate::format::PcmFormat;

/// One discrete buffer of 16-bit little-endian PCM.
///
/// Cloning is cheap (reference counted) and the contents can never change
/// once the chunk has been created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioChunk(Bytes);

impl AudioChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        AudioChunk(bytes.into())
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        AudioChunk(Bytes::copy_from_slice(bytes))
    }

    /// Encode samples as little-endian `i16`.
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut pcm: Vec<u8> = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            // Writing into a Vec cannot fail
            let _ = WriteBytesExt::write_i16::<LittleEndian>(&mut pcm, sample);
        }
        AudioChunk(pcm.into())
    }

    /// `frames` frames of digital silence.
    pub fn silence(frames: usize, format: &PcmFormat) -> Self {
        AudioChunk(vec![0u8; frames * format.bytes_per_frame()].into())
    }

    /// Decode the chunk back to samples. A trailing odd byte is ignored.
    pub fn samples(&self) -> Vec<i16> {
        let even = self.0.len() - self.0.len() % 2;
        let mut samples = vec![0i16; even / 2];
        LittleEndian::read_i16_into(&self.0[..even], &mut samples);
        samples
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn duration(&self, format: &PcmFormat) -> Duration {
        format.duration_of(self.0.len())
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(bytes: Vec<u8>) -> Self {
        AudioChunk(bytes.into())
    }
}

impl From<Bytes> for AudioChunk {
    fn from(bytes: Bytes) -> Self {
        AudioChunk(bytes)
    }
}

impl AsRef<[u8]> for AudioChunk {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
