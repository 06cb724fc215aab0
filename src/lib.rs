//! tts-speaker-rs library crate
//!
//! Streams text through a speech synthesizer into a bounded frame queue and
//! plays it back on a dedicated thread, with cooperative shutdown.
//! The command line player is in main.rs.

#[macro_use]
extern crate log;

pub mod bridge;
pub mod buffer;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod duplex;
pub mod error;
pub mod format;
pub mod queue;
pub mod session;
pub mod signal;
pub mod sinks;
pub mod speaker;
pub mod synth;
pub mod text;
pub mod worker;

pub use chunk::AudioChunk;
pub use error::{DeviceError, SpeakerError, SynthesisError, TransportError};
pub use format::PcmFormat;
pub use queue::FrameQueue;
pub use session::Session;
pub use speaker::{Speaker, SpeakerState};

#[cfg(test)]
mod synth_tests;
