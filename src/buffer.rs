//! Prebuffer gate for the playback worker.
//!
//! Holds back the first chunks of an utterance until enough audio is queued
//! to avoid an audible stutter right after playback starts. By default
//! chunks are released in order and never merged or split; with a write
//! size set, released audio is re-framed into device writes of exactly
//! that many bytes, and only the final write of an utterance may be
//! shorter.

use std::collections::VecDeque;

use bytes::BytesMut;

use crate::chunk::AudioChunk;

#[derive(Default)]
pub struct PlaybackBuffer {
    pending: VecDeque<AudioChunk>,
    /// Bytes currently held back
    level: usize,
    threshold: usize,
    primed: bool,
    /// Fixed device write size in bytes, 0 to pass chunks through
    write_bytes: usize,
    /// Released audio not yet filling a whole write
    carry: BytesMut,
}

impl PlaybackBuffer {
    /// A gate that opens once `threshold` bytes are held. Zero disables
    /// prebuffering.
    pub fn new(threshold: usize) -> Self {
        PlaybackBuffer {
            threshold,
            primed: threshold == 0,
            ..Default::default()
        }
    }

    /// Re-frame released audio into writes of `write_bytes` bytes.
    pub fn with_write_size(mut self, write_bytes: usize) -> Self {
        self.write_bytes = write_bytes;
        self
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.carry.clear();
        self.level = 0;
        self.primed = self.threshold == 0;
    }

    /// Accept a chunk and return whatever is now ready to be written.
    pub fn push(&mut self, chunk: AudioChunk) -> Vec<AudioChunk> {
        if self.primed {
            return self.reframe(vec![chunk]);
        }

        self.level += chunk.len();
        self.pending.push_back(chunk);

        if self.level >= self.threshold {
            self.primed = true;
            let held = self.take_pending();
            return self.reframe(held);
        }

        vec![]
    }

    /// Release everything held back, regardless of the threshold, including
    /// a trailing partial write.
    pub fn release(&mut self) -> Vec<AudioChunk> {
        let held = self.take_pending();
        let mut out = self.reframe(held);
        if !self.carry.is_empty() {
            out.push(AudioChunk::from(self.carry.split().freeze()));
        }
        out
    }

    /// Check if the gate is holding audio back
    pub fn has_data(&self) -> bool {
        !self.pending.is_empty() || !self.carry.is_empty()
    }

    fn take_pending(&mut self) -> Vec<AudioChunk> {
        self.level = 0;
        self.pending.drain(..).collect()
    }

    fn reframe(&mut self, chunks: Vec<AudioChunk>) -> Vec<AudioChunk> {
        if self.write_bytes == 0 {
            return chunks;
        }

        let mut out = Vec::new();
        for chunk in chunks {
            self.carry.extend_from_slice(chunk.as_bytes());
            while self.carry.len() >= self.write_bytes {
                out.push(AudioChunk::from(self.carry.split_to(self.write_bytes).freeze()));
            }
        }
        out
    }
}
