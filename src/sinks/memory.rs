use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::chunk::AudioChunk;
use crate::error::DeviceError;
use crate::format::PcmFormat;
use crate::sinks::AudioSink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Open(PcmFormat),
    Write(AudioChunk),
    Close,
}

/// Captures everything written to it in shared memory.
///
/// Clones share the same event log, so a caller can keep one clone for
/// inspection and hand the other to a speaker.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
    write_delay: Option<Duration>,
    open: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` on every write, emulating a device that accepts
    /// data at a limited rate.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    fn log(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        match self.events.lock() {
            Ok(events) => events,
            Err(e) => e.into_inner(),
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.log().clone()
    }

    /// Chunks written so far, in write order.
    pub fn writes(&self) -> Vec<AudioChunk> {
        self.log()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Write(chunk) => Some(chunk.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.count(|event| matches!(event, SinkEvent::Open(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|event| matches!(event, SinkEvent::Close))
    }

    fn count(&self, f: impl Fn(&SinkEvent) -> bool) -> usize {
        self.log().iter().filter(|event| f(event)).count()
    }

    /// All written PCM concatenated.
    pub fn pcm(&self) -> Vec<u8> {
        self.writes()
            .iter()
            .flat_map(|chunk| chunk.as_bytes().to_vec())
            .collect()
    }
}

impl AudioSink for MemorySink {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        format.validate()?;
        self.open = true;
        self.log().push(SinkEvent::Open(*format));
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::NotOpen);
        }
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        self.log().push(SinkEvent::Write(AudioChunk::from_slice(pcm)));
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.open {
            self.open = false;
            self.log().push(SinkEvent::Close);
        }
        Ok(())
    }
}
