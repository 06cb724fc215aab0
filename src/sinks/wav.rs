//! WAV outputs: a finalized file on disk, or an endless stream over any
//! writer (stdout for piping into a player, or a TCP connection).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;

use byteorder::{ByteOrder, LittleEndian};
use hound::WavWriter;

use crate::error::DeviceError;
use crate::format::PcmFormat;
use crate::sinks::AudioSink;

/// Writes each session into a WAV file at `path`, replacing it on every
/// `open`.
pub struct WavFileSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    /// Odd byte left over from a chunk that split a sample
    carry: Option<u8>,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WavFileSink {
            path: path.into(),
            writer: None,
            carry: None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl AudioSink for WavFileSink {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        format.validate()?;
        let writer = WavWriter::create(&self.path, format.wav_spec())
            .map_err(|e| DeviceError::Open(format!("{}: {e}", self.path.display())))?;
        debug!("Opened WAV file {}", self.path.display());
        self.writer = Some(writer);
        self.carry = None;
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        let writer = self.writer.as_mut().ok_or(DeviceError::NotOpen)?;

        let mut bytes = Vec::with_capacity(pcm.len() + 1);
        bytes.extend(self.carry.take());
        bytes.extend_from_slice(pcm);
        if bytes.len() % 2 == 1 {
            self.carry = bytes.pop();
        }

        let mut samples = vec![0i16; bytes.len() / 2];
        LittleEndian::read_i16_into(&bytes, &mut samples);
        for sample in samples {
            writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            debug!("Finalized WAV file {}", self.path.display());
        }
        Ok(())
    }
}

type WriterFactory = Box<dyn FnMut() -> io::Result<Box<dyn Write + Send>> + Send>;

/// Writes a WAV header for an infinite file followed by raw PCM, so players
/// can start rendering the stream before it ends.
pub struct WavStreamSink {
    factory: WriterFactory,
    writer: Option<Box<dyn Write + Send>>,
}

impl WavStreamSink {
    /// `factory` is called on every `open` to obtain a fresh writer.
    pub fn new<F, W>(mut factory: F) -> Self
    where
        F: FnMut() -> io::Result<W> + Send + 'static,
        W: Write + Send + 'static,
    {
        WavStreamSink {
            factory: Box::new(move || Ok(Box::new(factory()?) as Box<dyn Write + Send>)),
            writer: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(|| Ok(io::stdout()))
    }

    /// Connect to `addr` on every `open`.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self::new(move || {
            let stream = TcpStream::connect(addr)?;
            stream.set_nodelay(true)?;
            Ok(stream)
        })
    }
}

impl AudioSink for WavStreamSink {
    fn open(&mut self, format: &PcmFormat) -> Result<(), DeviceError> {
        format.validate()?;
        let mut writer = (self.factory)().map_err(|e| DeviceError::Open(e.to_string()))?;

        // Write the wav header to the stream using the hound crate
        // This will allow players to recognize the stream as a wav file
        let header = format.wav_spec().into_header_for_infinite_file();
        writer.write_all(&header[..]).map_err(DeviceError::Write)?;

        self.writer = Some(writer);
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        let writer = self.writer.as_mut().ok_or(DeviceError::NotOpen)?;
        writer.write_all(pcm).map_err(DeviceError::Write)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(DeviceError::Write)?;
        }
        Ok(())
    }
}
