//! Text-to-audio bridge: pulls text fragments, synthesizes them and pushes
//! the resulting chunks onto the frame queue in arrival order.

use std::thread::{self, JoinHandle};

use crate::chunk::AudioChunk;
use crate::error::SpeakerError;
use crate::queue::{Frame, Producer};
use crate::synth::Synthesizer;
use crate::text::TextSource;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeReport {
    pub fragments: usize,
    pub chunks_enqueued: usize,
    pub bytes_enqueued: usize,
    /// Chunks that only came out of the final flush
    pub flushed_chunks: usize,
}

pub struct Bridge<'a> {
    synth: &'a mut dyn Synthesizer,
    producer: Producer,
    report: BridgeReport,
}

impl<'a> Bridge<'a> {
    pub fn new(synth: &'a mut dyn Synthesizer, producer: Producer) -> Self {
        Bridge {
            synth,
            producer,
            report: BridgeReport::default(),
        }
    }

    /// Consume `source` to exhaustion, then flush the synthesizer.
    ///
    /// A failing fragment or synthesis call aborts the rest of the source,
    /// but the flush is still attempted so trailing audio reaches the queue
    /// before the error is returned. A stop request, or a playback worker
    /// that is gone, skips the flush.
    pub fn run(mut self, source: impl TextSource) -> Result<BridgeReport, SpeakerError> {
        let result = self.pump(source);

        match result {
            Err(e @ (SpeakerError::Cancelled | SpeakerError::WorkerExited)) => {
                debug!("Bridge ended after {} fragment(s): {e}", self.report.fragments);
                Err(e)
            }
            Err(e) => {
                error!("Error while synthesizing speech: {e}");
                if let Err(flush_err) = self.flush() {
                    warn!("Flush after failed utterance also failed: {flush_err}");
                }
                Err(e)
            }
            Ok(()) => {
                self.flush()?;
                Ok(self.report)
            }
        }
    }

    fn pump(&mut self, source: impl TextSource) -> Result<(), SpeakerError> {
        for fragment in source {
            self.producer.check()?;

            let text = fragment?;
            self.report.fragments += 1;
            trace!("Synthesizing {text:?}");

            let chunks = self.synth.synthesize(&text)?;
            self.enqueue(chunks)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpeakerError> {
        let chunks = self.synth.flush()?;
        self.report.flushed_chunks += chunks.len();
        self.enqueue(chunks)
    }

    fn enqueue(&mut self, chunks: Vec<AudioChunk>) -> Result<(), SpeakerError> {
        for chunk in chunks {
            let len = chunk.len();
            self.producer.send(Frame::Audio(chunk))?;
            self.report.chunks_enqueued += 1;
            self.report.bytes_enqueued += len;
        }
        Ok(())
    }
}

/// Run a bridge on its own synthesis thread.
///
/// The synthesizer is handed back together with the result so it can be
/// reused for the next utterance.
pub fn spawn_bridge<Y, S>(
    mut synth: Y,
    source: S,
    producer: Producer,
) -> Result<JoinHandle<(Y, Result<BridgeReport, SpeakerError>)>, SpeakerError>
where
    Y: Synthesizer + 'static,
    S: TextSource + 'static,
{
    thread::Builder::new()
        .name("speaker-synthesis".into())
        .spawn(move || {
            let result = Bridge::new(&mut synth, producer).run(source);
            (synth, result)
        })
        .map_err(SpeakerError::Spawn)
}
