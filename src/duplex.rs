//! Send-only topology for remote synthesizers.
//!
//! Text goes out over one channel while audio comes back asynchronously on
//! another. The sending side never touches the frame queue; a receiver
//! thread listens to the audio feed and feeds the queue directly.

use std::io::Write;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::chunk::AudioChunk;
use crate::error::{SpeakerError, TransportError};
use crate::queue::{Frame, Producer};
use crate::synth::Synthesizer;
use crate::text::TextSource;

/// Control messages understood by streaming speech endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SpeakCommand {
    Speak { text: String },
    /// Emit audio for everything sent so far
    Flush,
    Close,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMessage {
    Audio(AudioChunk),
    /// Any textual status the endpoint sends besides flush acknowledgements
    Metadata(String),
    /// All audio for the text sent before the last flush has been delivered
    Flushed,
}

pub trait SpeechTransport: Send {
    fn send(&mut self, command: &SpeakCommand) -> Result<(), TransportError>;
}

pub trait AudioFeed: Send {
    /// Next message, or `None` once the feed has closed. May block.
    fn recv(&mut self) -> Result<Option<TransportMessage>, TransportError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    pub fragments_sent: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    pub chunks_received: usize,
    pub bytes_received: usize,
    pub flushed: bool,
}

/// Send every fragment as a `Speak` command followed by a `Flush`.
///
/// The flush is still sent best-effort when the source fails, so the
/// endpoint returns whatever audio it already has and the receiver can end
/// the stream. Sending stops early, without a flush, once `producer` is
/// stopped or its playback worker is gone.
pub fn send_text(
    transport: &mut dyn SpeechTransport,
    source: impl TextSource,
    producer: &Producer,
) -> Result<SendReport, SpeakerError> {
    let mut report = SendReport::default();
    let result = send_fragments(transport, source, producer, &mut report);

    match result {
        Ok(()) => {
            transport.send(&SpeakCommand::Flush)?;
            Ok(report)
        }
        Err(e @ (SpeakerError::Cancelled | SpeakerError::WorkerExited)) => Err(e),
        Err(e) => {
            error!("Error while sending text: {e}");
            if let Err(flush_err) = transport.send(&SpeakCommand::Flush) {
                warn!("Flush after failed utterance also failed: {flush_err}");
            }
            Err(e)
        }
    }
}

fn send_fragments(
    transport: &mut dyn SpeechTransport,
    source: impl TextSource,
    producer: &Producer,
    report: &mut SendReport,
) -> Result<(), SpeakerError> {
    for fragment in source {
        producer.check()?;
        let text = fragment?;
        transport.send(&SpeakCommand::Speak { text })?;
        report.fragments_sent += 1;
    }
    Ok(())
}

/// Listen to `feed` on a dedicated thread and play incoming audio.
///
/// The end-of-stream sentinel is queued when the endpoint acknowledges the
/// flush, when the feed closes, or when it fails, so playback always gets
/// to drain and exit. The receiver also stops listening once `producer` is
/// stopped or its playback worker is gone.
pub fn spawn_receiver<F>(
    feed: F,
    producer: Producer,
) -> Result<JoinHandle<Result<ReceiverReport, TransportError>>, SpeakerError>
where
    F: AudioFeed + 'static,
{
    thread::Builder::new()
        .name("speaker-receiver".into())
        .spawn(move || receive(feed, producer))
        .map_err(SpeakerError::Spawn)
}

fn receive<F: AudioFeed>(
    mut feed: F,
    producer: Producer,
) -> Result<ReceiverReport, TransportError> {
    let mut report = ReceiverReport::default();

    let result = loop {
        if let Err(e) = producer.check() {
            debug!("Receiver done: {e}");
            break Ok(());
        }

        match feed.recv() {
            Ok(Some(TransportMessage::Audio(chunk))) => {
                report.chunks_received += 1;
                report.bytes_received += chunk.len();
                if let Err(e) = producer.send(Frame::Audio(chunk)) {
                    debug!("Receiver done: {e}");
                    break Ok(());
                }
            }
            Ok(Some(TransportMessage::Metadata(message))) => {
                info!("Speech endpoint: {message}");
            }
            Ok(Some(TransportMessage::Flushed)) => {
                report.flushed = true;
                break Ok(());
            }
            Ok(None) => {
                debug!("Audio feed closed");
                break Ok(());
            }
            Err(e) => {
                error!("Receiver error: {e}");
                break Err(e);
            }
        }
    };

    if producer.send(Frame::EndOfStream).is_err() {
        trace!("End of stream not queued, playback is already over");
    }

    result.map(|()| report)
}

/// Writes commands as one JSON object per line.
pub struct JsonLinesTransport<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesTransport { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SpeechTransport for JsonLinesTransport<W> {
    fn send(&mut self, command: &SpeakCommand) -> Result<(), TransportError> {
        serde_json::to_writer(&mut self.writer, command)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Sending half of an in-process speech endpoint.
pub struct LoopbackTransport {
    tx: Sender<SpeakCommand>,
}

impl SpeechTransport for LoopbackTransport {
    fn send(&mut self, command: &SpeakCommand) -> Result<(), TransportError> {
        self.tx
            .send(command.clone())
            .map_err(|_| TransportError::Closed)
    }
}

/// Receiving half of an in-process speech endpoint.
pub struct LoopbackFeed {
    rx: Receiver<Result<TransportMessage, TransportError>>,
}

impl AudioFeed for LoopbackFeed {
    fn recv(&mut self) -> Result<Option<TransportMessage>, TransportError> {
        match self.rx.recv() {
            Ok(message) => message.map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// Serve a synthesizer behind a transport/feed pair on its own thread,
/// behaving like a remote streaming endpoint: audio for `Speak` commands
/// arrives asynchronously on the feed, `Flush` is acknowledged after the
/// trailing audio, and dropping the transport or sending `Close` ends the
/// feed.
pub fn loopback<Y>(synth: Y) -> Result<(LoopbackTransport, LoopbackFeed), SpeakerError>
where
    Y: Synthesizer + 'static,
{
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<SpeakCommand>();
    let (msg_tx, msg_rx) = crossbeam_channel::unbounded();

    thread::Builder::new()
        .name("speaker-loopback".into())
        .spawn(move || serve(synth, cmd_rx, msg_tx))
        .map_err(SpeakerError::Spawn)?;

    Ok((LoopbackTransport { tx: cmd_tx }, LoopbackFeed { rx: msg_rx }))
}

fn serve<Y: Synthesizer>(
    mut synth: Y,
    commands: Receiver<SpeakCommand>,
    messages: Sender<Result<TransportMessage, TransportError>>,
) {
    let deliver = |chunks: Vec<AudioChunk>| {
        chunks
            .into_iter()
            .all(|chunk| messages.send(Ok(TransportMessage::Audio(chunk))).is_ok())
    };

    while let Ok(command) = commands.recv() {
        let delivered = match command {
            SpeakCommand::Speak { text } => match synth.synthesize(&text) {
                Ok(chunks) => deliver(chunks),
                Err(e) => messages.send(Err(TransportError::msg(e.to_string()))).is_ok(),
            },
            SpeakCommand::Flush => match synth.flush() {
                Ok(chunks) => deliver(chunks) && messages.send(Ok(TransportMessage::Flushed)).is_ok(),
                Err(e) => messages.send(Err(TransportError::msg(e.to_string()))).is_ok(),
            },
            SpeakCommand::Close => break,
        };

        if !delivered {
            break;
        }
    }

    debug!("Loopback endpoint closed");
}
