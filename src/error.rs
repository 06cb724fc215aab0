//! Error types for the playback pipeline.

use std::io;

/// Failure opening, writing or closing the output device.
///
/// Fatal to the current speaker session and never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to open audio device: {0}")]
    Open(String),

    #[error("failed to write to audio device: {0}")]
    Write(#[source] io::Error),

    #[error("audio device is not open")]
    NotOpen,

    #[error("unsupported PCM format: {0}")]
    Format(String),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure in whatever delivers text to the bridge or audio back from a
/// remote synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Message(String),

    #[error("transport closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    pub fn msg(message: impl Into<String>) -> Self {
        TransportError::Message(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SpeakerError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("invalid speaker configuration: {0}")]
    Config(String),

    #[error("synthesizer produces {synth} Hz audio but the speaker plays {speaker} Hz")]
    FormatMismatch { synth: u32, speaker: u32 },

    #[error("speaker is already started")]
    AlreadyStarted,

    #[error("speaker is not started")]
    NotStarted,

    #[error("audio device was lost with a crashed playback worker")]
    DeviceLost,

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("playback worker panicked")]
    WorkerPanicked,

    #[error("playback stopped before the queue drained")]
    NotDrained,

    #[error("playback worker has exited, nothing is draining the queue")]
    WorkerExited,

    #[error("speech cancelled")]
    Cancelled,
}
