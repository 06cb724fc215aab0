use std::time::Duration;

// Define some constants for the audio parameters
pub const SAMPLE_RATE: u32 = 48000; // 48 kHz playback rate
pub const BIT_DEPTH: u16 = 16; // 16 bits per sample, signed little-endian
pub const CHANNELS: u16 = 1; // Mono

/// Native output rate of the espeak-ng synthesizer.
pub const ESPEAK_SAMPLE_RATE: u32 = 22050;

/// Rate used for microphone capture.
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// How long the playback worker waits on an empty queue before re-checking
/// the stop signal.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Frames per chunk emitted by the built-in synthesizers.
pub const CHUNK_FRAMES: usize = 4000;
