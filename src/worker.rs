//! Background loop that drains the frame queue into the output device.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::PlaybackBuffer;
use crate::error::DeviceError;
use crate::queue::{FrameQueue, Poll};
use crate::signal::{AliveGuard, FinishedSignal, StopSignal};
use crate::sinks::AudioSink;

/// Why the worker loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The end-of-stream sentinel was dequeued after all earlier chunks.
    EndOfStream,
    /// The stop signal was observed; queued chunks were left behind.
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub chunks_written: usize,
    pub bytes_written: usize,
}

/// What the worker hands back to the controller when its thread ends.
pub struct WorkerReport {
    pub device: Box<dyn AudioSink>,
    pub exit: Result<WorkerExit, DeviceError>,
    pub stats: PlaybackStats,
}

pub struct PlaybackWorker {
    pub queue: FrameQueue,
    pub device: Box<dyn AudioSink>,
    pub stop: StopSignal,
    pub finished: Arc<FinishedSignal>,
    pub poll_timeout: Duration,
    pub prebuffer_bytes: usize,
    pub write_bytes: usize,
}

impl PlaybackWorker {
    /// Run the loop on a dedicated thread.
    ///
    /// The finished signal is marked alive before the thread exists, so a
    /// waiter can never observe a worker that has not started yet as dead.
    pub fn spawn(self) -> std::io::Result<JoinHandle<WorkerReport>> {
        self.finished.worker_started();
        let finished = self.finished.clone();

        let spawned = thread::Builder::new()
            .name("speaker-playback".into())
            .spawn(move || self.run());

        if spawned.is_err() {
            finished.worker_exited();
        }
        spawned
    }

    fn run(mut self) -> WorkerReport {
        let _alive = AliveGuard(self.finished.clone());
        let mut stats = PlaybackStats::default();
        let mut gate = PlaybackBuffer::new(self.prebuffer_bytes).with_write_size(self.write_bytes);

        debug!("Playback worker started");
        let exit = self.drain(&mut gate, &mut stats);

        match &exit {
            Ok(exit) => debug!(
                "Playback worker exited ({exit:?}) after {} chunks",
                stats.chunks_written
            ),
            Err(e) => error!("Playback worker terminated by device error: {e}"),
        }

        WorkerReport {
            device: self.device,
            exit,
            stats,
        }
    }

    fn drain(
        &mut self,
        gate: &mut PlaybackBuffer,
        stats: &mut PlaybackStats,
    ) -> Result<WorkerExit, DeviceError> {
        loop {
            if self.stop.is_stopped() {
                if self.queue.is_empty() && !gate.has_data() {
                    self.finished.set();
                }
                return Ok(WorkerExit::Stopped);
            }

            match self.queue.get(self.poll_timeout) {
                Poll::Chunk(chunk) => {
                    for chunk in gate.push(chunk) {
                        self.device.write(chunk.as_bytes())?;
                        stats.chunks_written += 1;
                        stats.bytes_written += chunk.len();
                    }
                }
                Poll::End => {
                    for chunk in gate.release() {
                        self.device.write(chunk.as_bytes())?;
                        stats.chunks_written += 1;
                        stats.bytes_written += chunk.len();
                    }
                    self.finished.set();
                    return Ok(WorkerExit::EndOfStream);
                }
                Poll::Empty => {
                    trace!("Playback queue idle");
                }
            }
        }
    }
}
