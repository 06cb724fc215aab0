//! One conversation turn: speak a text stream through a speaker and bring
//! the speaker back to Idle, whatever happens on the way.

use crate::bridge::{Bridge, BridgeReport};
use crate::duplex::{self, AudioFeed, ReceiverReport, SendReport, SpeakCommand, SpeechTransport};
use crate::error::{SpeakerError, TransportError};
use crate::signal::StopSignal;
use crate::speaker::{PlaybackReport, Speaker};
use crate::synth::Synthesizer;
use crate::text::TextSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub bridge: BridgeReport,
    pub playback: Option<PlaybackReport>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuplexReport {
    pub sent: SendReport,
    pub received: ReceiverReport,
    pub playback: Option<PlaybackReport>,
}

/// State scoped to a single turn. Borrows the speaker for the turn's
/// lifetime instead of sharing it through globals.
pub struct Session<'a> {
    speaker: &'a mut Speaker,
    stop: StopSignal,
}

impl<'a> Session<'a> {
    pub fn new(speaker: &'a mut Speaker) -> Self {
        Self::with_signal(speaker, StopSignal::new())
    }

    /// Use a stop signal created elsewhere, e.g. before the session is
    /// moved onto a blocking thread.
    pub fn with_signal(speaker: &'a mut Speaker, stop: StopSignal) -> Self {
        Session { speaker, stop }
    }

    /// Handle that cancels this turn from any thread.
    pub fn canceller(&self) -> StopSignal {
        self.stop.clone()
    }

    fn begin(&mut self, sample_rate: Option<u32>) -> Result<(), SpeakerError> {
        let format = self.speaker.format();
        if let Some(sample_rate) = sample_rate {
            if sample_rate != format.sample_rate {
                return Err(SpeakerError::FormatMismatch {
                    synth: sample_rate,
                    speaker: format.sample_rate,
                });
            }
        }

        self.speaker.start_with_signal(self.stop.clone())?;
        self.speaker.begin_utterance();
        Ok(())
    }

    /// Bring the speaker back to Idle: drain unless the turn was cancelled.
    ///
    /// A turn that ended because the worker exited reports the worker's own
    /// error instead.
    fn end<T>(
        &mut self,
        result: Result<T, SpeakerError>,
    ) -> (Result<T, SpeakerError>, Option<PlaybackReport>) {
        let stopped = match &result {
            Err(SpeakerError::Cancelled) => self.speaker.abort(),
            _ if self.stop.is_stopped() => self.speaker.abort(),
            _ => self.speaker.finish(),
        };

        match stopped {
            Ok(playback) => (result, playback),
            Err(e) => {
                let result = match result {
                    Err(SpeakerError::WorkerExited) => Err(e),
                    // The turn's own error is more useful than the device's
                    result => result.and(Err(e)),
                };
                (result, None)
            }
        }
    }

    /// Synthesize `source` locally and play it to the end.
    ///
    /// Bridge errors are returned after the speaker has drained whatever
    /// audio was already produced and gone back to Idle.
    pub fn speak(
        mut self,
        synth: &mut dyn Synthesizer,
        source: impl TextSource,
    ) -> Result<SessionReport, SpeakerError> {
        let synth_format = synth.format();
        if synth_format.channels != self.speaker.format().channels {
            return Err(SpeakerError::Config(format!(
                "synthesizer produces {} channel(s) but the speaker plays {}",
                synth_format.channels,
                self.speaker.format().channels
            )));
        }
        self.begin(Some(synth_format.sample_rate))?;

        let bridged = Bridge::new(synth, self.speaker.producer()).run(source);

        let (bridged, playback) = self.end(bridged);
        Ok(SessionReport {
            bridge: bridged?,
            playback,
        })
    }

    /// Send `source` over `transport` while a receiver thread plays the audio
    /// arriving on `feed`.
    pub fn speak_duplex<F>(
        mut self,
        transport: &mut dyn SpeechTransport,
        feed: F,
        source: impl TextSource,
    ) -> Result<DuplexReport, SpeakerError>
    where
        F: AudioFeed + 'static,
    {
        self.begin(None)?;

        let producer = self.speaker.producer();
        let receiver = match duplex::spawn_receiver(feed, producer.clone()) {
            Ok(receiver) => receiver,
            Err(e) => return self.end(Err(e)).0,
        };

        let sent = duplex::send_text(transport, source, &producer);
        if sent.is_err() {
            // Nothing more will be acknowledged; closing the endpoint ends
            // the feed so the receiver is not left blocked on it
            if let Err(e) = transport.send(&SpeakCommand::Close) {
                debug!("Could not close speech endpoint: {e}");
            }
        }

        let received = match receiver.join() {
            Ok(received) => received.map_err(SpeakerError::from),
            Err(_) => Err(SpeakerError::Transport(TransportError::msg(
                "receiver thread panicked",
            ))),
        };

        let result = sent.and_then(|sent| received.map(|received| (sent, received)));
        let (result, playback) = self.end(result);
        let (sent, received) = result?;

        Ok(DuplexReport {
            sent,
            received,
            playback,
        })
    }
}
