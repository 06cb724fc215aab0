//! Test infrastructure for tts-speaker-rs integration tests.
//!
//! Provides scripted synthesizers, failing devices and sources, and
//! helpers for inspecting what reached the output device.

#![allow(dead_code)]

use std::time::Duration;

pub use tts_speaker_rs::chunk::AudioChunk;
pub use tts_speaker_rs::config::{DrainPolicy, SpeakerConfig};
pub use tts_speaker_rs::error::{DeviceError, SpeakerError, SynthesisError, TransportError};
pub use tts_speaker_rs::format::PcmFormat;
pub use tts_speaker_rs::queue::FrameQueue;
pub use tts_speaker_rs::signal::StopSignal;
pub use tts_speaker_rs::sinks::{AudioSink, MemorySink, SinkEvent};
pub use tts_speaker_rs::speaker::{Speaker, SpeakerState};
pub use tts_speaker_rs::synth::Synthesizer;
pub use tts_speaker_rs::text::{Fragment, ScriptedSource};
pub use tts_speaker_rs::worker::WorkerExit;
pub use tts_speaker_rs::Session;

/// Speaker settings with a short poll interval so tests stop quickly.
pub fn test_config() -> SpeakerConfig {
    SpeakerConfig {
        poll_timeout_ms: 5,
        ..Default::default()
    }
}

/// A chunk whose bytes spell out `label`, so write order is easy to assert.
pub fn labeled(label: &str) -> AudioChunk {
    AudioChunk::from(label.as_bytes().to_vec())
}

/// Labels of every chunk written to `sink`, in write order.
pub fn written_labels(sink: &MemorySink) -> Vec<String> {
    sink.writes()
        .iter()
        .map(|chunk| String::from_utf8_lossy(chunk.as_bytes()).into_owned())
        .collect()
}

/// Synthesizer that turns fragment `f` into chunks `f.0`, `f.1` and emits a
/// single `flush` chunk when flushed.
pub struct StubSynth {
    pub format: PcmFormat,
    pub flushes: usize,
}

impl StubSynth {
    pub fn new() -> Self {
        StubSynth {
            format: PcmFormat::default(),
            flushes: 0,
        }
    }

    pub fn with_format(format: PcmFormat) -> Self {
        StubSynth { format, flushes: 0 }
    }
}

impl Synthesizer for StubSynth {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioChunk>, SynthesisError> {
        Ok(vec![labeled(&format!("{text}.0")), labeled(&format!("{text}.1"))])
    }

    fn flush(&mut self) -> Result<Vec<AudioChunk>, SynthesisError> {
        self.flushes += 1;
        Ok(vec![labeled("flush")])
    }
}

/// Yields `good` fragments, then a transport error.
pub fn failing_source(good: &[&str]) -> impl Iterator<Item = Fragment> + Send + 'static {
    good.iter()
        .map(|text| Ok(text.to_string()))
        .chain(std::iter::once(Err(TransportError::msg("connection reset"))))
        .collect::<Vec<_>>()
        .into_iter()
}

/// Device that accepts `ok_writes` writes and fails every one after that.
pub struct FailingSink {
    inner: MemorySink,
    ok_writes: usize,
    writes: usize,
}

impl FailingSink {
    pub fn new(inner: MemorySink, ok_writes: usize) -> Self {
        FailingSink {
            inner,
            ok_writes,
            writes: 0,
        }
    }
}

impl AudioSink for FailingSink {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        self.writes = 0;
        self.inner.open(format)
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        if self.writes >= self.ok_writes {
            return Err(DeviceError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        self.writes += 1;
        self.inner.write(pcm)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.inner.close()
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
