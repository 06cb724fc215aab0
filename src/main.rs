#[macro_use]
extern crate log;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tts_speaker_rs::config::{self, Config, OutputKind, SynthKind, Topology};
use tts_speaker_rs::duplex;
use tts_speaker_rs::signal::StopSignal;
use tts_speaker_rs::sinks::{AudioSink, PacedSink, WavFileSink, WavStreamSink};
use tts_speaker_rs::synth::{Synthesizer, ToneSynthesizer};
use tts_speaker_rs::text::LineSource;
use tts_speaker_rs::{Session, Speaker};

const DEFAULT_CONFIG_PATH: &str = "Speaker.toml";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = read_config(&config_path).await?;

    let device = output_device(&config)?;
    let synth = synthesizer(&config)?;
    let speaker = Speaker::new(config.speaker.clone(), device)?;

    let stop = StopSignal::new();
    let canceller = stop.clone();
    let topology = config.topology;

    let mut speaking = tokio::task::spawn_blocking(move || speak(speaker, synth, stop, topology));

    let result = tokio::select! {
        result = &mut speaking => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping playback");
            canceller.stop();

            // The session may be blocked reading stdin; it only notices the
            // stop at its next check point
            match tokio::time::timeout(SHUTDOWN_GRACE, speaking).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Speech task did not stop within {SHUTDOWN_GRACE:?}, exiting");
                    std::process::exit(130);
                }
            }
        }
    };

    result.context("Speech task panicked")?
}

async fn read_config(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        info!("No config at {path}, using defaults");
        return Ok(Config::default());
    }

    config::load(path)
        .await
        .with_context(|| format!("Failed to load config from {path}"))
}

fn output_device(config: &Config) -> Result<Box<dyn AudioSink>> {
    let output = &config.output;
    let device: Box<dyn AudioSink> = match output.kind {
        OutputKind::Stdout => Box::new(WavStreamSink::stdout()),
        OutputKind::WavFile => {
            let path = output
                .path
                .clone()
                .context("output.path is required for wav_file output")?;
            Box::new(WavFileSink::new(path))
        }
        OutputKind::Tcp => {
            let addr = output
                .addr
                .context("output.addr is required for tcp output")?;
            Box::new(WavStreamSink::tcp(addr))
        }
    };

    if output.paced {
        Ok(Box::new(PacedSink::new(device)))
    } else {
        Ok(device)
    }
}

fn synthesizer(config: &Config) -> Result<Box<dyn Synthesizer>> {
    match config.synth.engine {
        SynthKind::Tone => Ok(Box::new(
            ToneSynthesizer::new(config.speaker.format())
                .with_chunk_frames(config.synth.chunk_frames),
        )),
        #[cfg(feature = "espeak")]
        SynthKind::Espeak => Ok(Box::new(
            tts_speaker_rs::synth::espeak::EspeakSynthesizer::new(config.synth.voice.clone())
                .with_chunk_frames(config.synth.chunk_frames),
        )),
        #[cfg(not(feature = "espeak"))]
        SynthKind::Espeak => anyhow::bail!("built without the espeak feature"),
    }
}

fn speak(
    mut speaker: Speaker,
    mut synth: Box<dyn Synthesizer>,
    stop: StopSignal,
    topology: Topology,
) -> Result<()> {
    let session = Session::with_signal(&mut speaker, stop);
    let source = LineSource::stdin();

    match topology {
        Topology::Direct => {
            let report = session.speak(synth.as_mut(), source)?;
            info!(
                "Spoke {} fragment(s), {:.1}s of audio",
                report.bridge.fragments,
                report
                    .playback
                    .map_or(0.0, |playback| playback.played.as_secs_f64())
            );
        }
        Topology::Loopback => {
            let (mut transport, feed) = duplex::loopback(synth)?;
            let report = session.speak_duplex(&mut transport, feed, source)?;
            info!(
                "Sent {} fragment(s), received {} chunk(s)",
                report.sent.fragments_sent, report.received.chunks_received
            );
        }
    }

    Ok(())
}
