//! Audio output device abstraction.
//!
//! All outputs implement the `AudioSink` trait, which the playback worker
//! writes PCM chunks into from its own thread.

pub mod memory;
pub mod paced;
pub mod wav;

pub use memory::{MemorySink, SinkEvent};
pub use paced::PacedSink;
pub use wav::{WavFileSink, WavStreamSink};

use crate::error::DeviceError;
use crate::format::PcmFormat;

/// An output device accepting raw 16-bit little-endian PCM.
///
/// `write` may block until the device accepts the data; that is the
/// pipeline's only backpressure towards producers. Each `open` must yield a
/// fresh handle so a speaker can be restarted after `close`.
pub trait AudioSink: Send {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError>;

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        (**self).open(format)
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        (**self).write(pcm)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
}
