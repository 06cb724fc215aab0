use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

use crate::constants::{BIT_DEPTH, CHANNELS, CHUNK_FRAMES, POLL_TIMEOUT, SAMPLE_RATE};
use crate::error::SpeakerError;
use crate::format::PcmFormat;

/// What `Speaker::stop` does with audio that is still queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Discard queued audio and stop after the current write.
    #[default]
    Abrupt,
    /// Play everything queued, then stop.
    Drain,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpeakerConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,

    /// Maximum queued chunks before producers block. Unbounded when unset.
    pub queue_capacity: Option<usize>,

    /// Idle polling interval of the playback worker
    pub poll_timeout_ms: u64,

    pub drain_policy: DrainPolicy,

    /// Bytes to accumulate before the first write of an utterance
    pub prebuffer_bytes: usize,

    /// Re-frame audio into device writes of this many frames. 0 writes
    /// every chunk as it was produced.
    pub write_frames: usize,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        SpeakerConfig {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bit_depth: BIT_DEPTH,
            queue_capacity: None,
            poll_timeout_ms: POLL_TIMEOUT.as_millis() as u64,
            drain_policy: DrainPolicy::default(),
            prebuffer_bytes: 0,
            write_frames: 0,
        }
    }
}

impl SpeakerConfig {
    pub fn with_format(format: PcmFormat) -> Self {
        SpeakerConfig {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth,
            ..Default::default()
        }
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bit_depth,
        }
    }

    /// Device write size in bytes, 0 when chunks pass through unchanged.
    pub fn write_bytes(&self) -> usize {
        self.write_frames * self.format().bytes_per_frame()
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SpeakerError> {
        self.format()
            .validate()
            .map_err(|e| SpeakerError::Config(e.to_string()))?;
        if self.queue_capacity == Some(0) {
            return Err(SpeakerError::Config(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(SpeakerError::Config(
                "poll_timeout_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Endless WAV stream on stdout, e.g. piped into `aplay`
    #[default]
    Stdout,
    /// Finalized WAV file at `path`
    WavFile,
    /// Endless WAV stream sent to a socket listening at `addr`
    Tcp,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub kind: OutputKind,
    pub path: Option<PathBuf>,
    pub addr: Option<SocketAddr>,

    /// Throttle writes to real time
    pub paced: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            kind: OutputKind::default(),
            path: None,
            addr: None,
            paced: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthKind {
    #[default]
    Tone,
    Espeak,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthConfig {
    pub engine: SynthKind,
    pub chunk_frames: usize,
    pub voice: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            engine: SynthKind::default(),
            chunk_frames: CHUNK_FRAMES,
            voice: "en".to_string(),
        }
    }
}

/// How text reaches the synthesizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// The bridge calls the synthesizer and feeds the queue itself.
    #[default]
    Direct,
    /// Text goes out over a transport and audio comes back on a receiver.
    Loopback,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub topology: Topology,
    pub speaker: SpeakerConfig,
    pub output: OutputConfig,
    pub synth: SynthConfig,
}

pub fn parse(config: &str) -> Result<Config> {
    let config: Config = toml::from_str(config)?;
    config.speaker.validate()?;
    Ok(config)
}

pub async fn load(path: impl AsRef<Path>) -> Result<Config> {
    let config = read_to_string(path).await?;
    parse(&config)
}
