use std::time::{Duration, Instant};

use crate::error::DeviceError;
use crate::format::PcmFormat;
use crate::sinks::AudioSink;

/// Delivers audio to the inner sink no faster than real time.
///
/// Files and sockets accept data instantly; wrapping them restores the
/// rate-limited write behavior of a sound card.
pub struct PacedSink<S> {
    inner: S,
    format: Option<PcmFormat>,
    start_time: Option<Instant>,
    bytes_written: usize,
}

impl<S: AudioSink> PacedSink<S> {
    pub fn new(inner: S) -> Self {
        PacedSink {
            inner,
            format: None,
            start_time: None,
            bytes_written: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// How long to wait before `bytes` more bytes may be written.
    fn delay_for(&self, bytes: usize, elapsed: Duration) -> Duration {
        let Some(format) = self.format else {
            return Duration::ZERO;
        };
        // Allow the device buffer to run one chunk ahead
        let expected = format.duration_of(self.bytes_written.saturating_sub(bytes));
        expected.saturating_sub(elapsed)
    }
}

impl<S: AudioSink> AudioSink for PacedSink<S> {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        self.inner.open(format)?;
        self.format = Some(*format);
        self.start_time = None;
        self.bytes_written = 0;
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        let start_time = *self.start_time.get_or_insert_with(Instant::now);
        self.bytes_written += pcm.len();

        let delay = self.delay_for(pcm.len(), start_time.elapsed());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.inner.write(pcm)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.format = None;
        self.inner.close()
    }
}
