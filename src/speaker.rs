//! Speaker controller: owns the frame queue, the output device and the
//! playback worker thread.
//!
//! ```text
//! Idle --start()--> Started --stop()/finish()/abort()--> Stopping --> Idle
//! ```
//!
//! Chunks passed to [`Speaker::play`] while Idle stay queued and are played
//! after the next `start()`. Every stop clears the queue, so audio enqueued
//! before a stop is never replayed by a later session.
//!
//! A worker that ended on its own (end-of-stream or a device error) leaves
//! the speaker in `Stopping` until the next `start()`, `stop()`,
//! `finish()` or `abort()` reaps it.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::chunk::AudioChunk;
use crate::config::{DrainPolicy, SpeakerConfig};
use crate::error::SpeakerError;
use crate::format::PcmFormat;
use crate::queue::{Frame, FrameQueue, Producer};
use crate::signal::{FinishedSignal, StopSignal};
use crate::sinks::AudioSink;
use crate::worker::{PlaybackStats, PlaybackWorker, WorkerExit, WorkerReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeakerState {
    Idle,
    /// Device open, worker running
    Started,
    /// Stop requested, or the worker already exited and is waiting to be
    /// reaped
    Stopping,
}

/// Outcome of one started-to-idle cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    pub exit: WorkerExit,
    pub chunks_written: usize,
    pub bytes_written: usize,
    /// Frames left in the queue and thrown away by the stop
    pub discarded: usize,
    pub played: Duration,
}

pub struct Speaker {
    config: SpeakerConfig,
    format: PcmFormat,
    queue: FrameQueue,
    device: Option<Box<dyn AudioSink>>,
    worker: Option<JoinHandle<WorkerReport>>,
    stop: StopSignal,
    finished: Arc<FinishedSignal>,
    state: SpeakerState,
}

impl Speaker {
    pub fn new(config: SpeakerConfig, device: impl AudioSink + 'static) -> Result<Self, SpeakerError> {
        config.validate()?;

        Ok(Speaker {
            format: config.format(),
            queue: FrameQueue::with_capacity(config.queue_capacity),
            device: Some(Box::new(device)),
            worker: None,
            stop: StopSignal::new(),
            finished: Arc::new(FinishedSignal::new()),
            state: SpeakerState::Idle,
            config,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn config(&self) -> &SpeakerConfig {
        &self.config
    }

    pub fn state(&self) -> SpeakerState {
        if self.state == SpeakerState::Started && !self.finished.is_worker_alive() {
            return SpeakerState::Stopping;
        }
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state() == SpeakerState::Started
    }

    /// Handle for producers on other threads.
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Producer tied to the current session: it gives up when the session
    /// is stopped or the playback worker exits.
    pub fn producer(&self) -> Producer {
        Producer::new(self.queue.clone(), self.stop.clone()).watching(self.finished.clone())
    }

    pub fn is_worker_alive(&self) -> bool {
        self.finished.is_worker_alive()
    }

    /// Whether the speaker is running with nothing left to play. Racy by
    /// nature, only meant for idle heuristics.
    pub fn is_idle(&self) -> bool {
        self.is_started() && self.queue.is_empty()
    }

    /// Open the device and spawn the playback worker.
    pub fn start(&mut self) -> Result<(), SpeakerError> {
        self.start_with_signal(StopSignal::new())
    }

    /// Like [`Speaker::start`], but the worker observes a caller-owned stop
    /// signal so another component can cancel playback.
    pub fn start_with_signal(&mut self, stop: StopSignal) -> Result<(), SpeakerError> {
        if self.state != SpeakerState::Idle {
            if self.finished.is_worker_alive() {
                return Err(SpeakerError::AlreadyStarted);
            }
            self.reap();
        }

        let mut device = self.device.take().ok_or(SpeakerError::DeviceLost)?;
        if let Err(e) = device.open(&self.format) {
            self.device = Some(device);
            return Err(e.into());
        }

        info!(
            "Starting speaker at {} Hz, {} channel(s)",
            self.format.sample_rate, self.format.channels
        );

        let worker = PlaybackWorker {
            queue: self.queue.clone(),
            device,
            stop: stop.clone(),
            finished: self.finished.clone(),
            poll_timeout: self.config.poll_timeout(),
            prebuffer_bytes: self.config.prebuffer_bytes,
            write_bytes: self.config.write_bytes(),
        };

        // The device is gone with the closure if the spawn fails
        let handle = worker.spawn().map_err(SpeakerError::Spawn)?;

        self.stop = stop;
        self.worker = Some(handle);
        self.state = SpeakerState::Started;
        Ok(())
    }

    /// Enqueue one chunk. Blocks only while a bounded queue is full.
    ///
    /// Fails with [`SpeakerError::WorkerExited`] instead of blocking when
    /// the session's worker has already exited.
    pub fn play(&self, chunk: AudioChunk) -> Result<(), SpeakerError> {
        if self.worker.is_none() {
            self.queue.put(chunk);
            return Ok(());
        }
        Producer::new(self.queue.clone(), StopSignal::new())
            .watching(self.finished.clone())
            .send(Frame::Audio(chunk))
    }

    /// Forget the previous utterance's completion before starting a new one.
    pub fn begin_utterance(&self) {
        self.finished.clear();
    }

    /// Block until the worker has drained the queue up to the end-of-stream
    /// sentinel (or stopped with nothing left to play).
    pub fn wait_until_drained(&self) -> Result<(), SpeakerError> {
        if self.worker.is_none() && !self.finished.is_set() {
            return Err(SpeakerError::NotStarted);
        }
        if self.finished.wait() {
            Ok(())
        } else {
            Err(SpeakerError::NotDrained)
        }
    }

    /// Stop according to the configured drain policy. A no-op returning
    /// `Ok(None)` when the speaker is not running.
    pub fn stop(&mut self) -> Result<Option<PlaybackReport>, SpeakerError> {
        match self.config.drain_policy {
            DrainPolicy::Abrupt => self.abort(),
            DrainPolicy::Drain => self.finish(),
        }
    }

    /// Stop now: the worker exits after its current write and anything
    /// still queued is discarded.
    pub fn abort(&mut self) -> Result<Option<PlaybackReport>, SpeakerError> {
        if self.worker.is_none() {
            return Ok(None);
        }

        self.state = SpeakerState::Stopping;
        self.stop.stop();
        self.shutdown().map(Some)
    }

    /// Drain then stop: queue the end-of-stream sentinel, wait for the
    /// worker to play everything before it, and release the device.
    pub fn finish(&mut self) -> Result<Option<PlaybackReport>, SpeakerError> {
        if self.worker.is_none() {
            return Ok(None);
        }

        self.state = SpeakerState::Stopping;

        // A dead worker would never make room in a full queue
        let mut frame = Frame::EndOfStream;
        while self.finished.is_worker_alive() {
            match self.queue.offer(frame, self.config.poll_timeout()) {
                Ok(()) => break,
                Err(returned) => frame = returned,
            }
        }

        self.shutdown().map(Some)
    }

    /// Clean up after a worker that exited on its own, so the speaker can be
    /// started again.
    fn reap(&mut self) {
        match self.shutdown() {
            Ok(report) => debug!("Reaped finished playback worker ({:?})", report.exit),
            Err(e) => warn!("Previous playback session ended with an error: {e}"),
        }
    }

    /// Join the worker, take the device back, close it, and clear the queue.
    fn shutdown(&mut self) -> Result<PlaybackReport, SpeakerError> {
        let Some(handle) = self.worker.take() else {
            self.state = SpeakerState::Idle;
            return Err(SpeakerError::NotStarted);
        };

        let joined = handle.join();
        let discarded = self.queue.clear();
        self.state = SpeakerState::Idle;

        let WorkerReport {
            mut device,
            exit,
            stats,
        } = match joined {
            Ok(report) => report,
            Err(_) => {
                error!("Playback worker panicked, audio device lost");
                return Err(SpeakerError::WorkerPanicked);
            }
        };

        let closed = device.close();
        self.device = Some(device);

        if discarded > 0 {
            debug!("Discarded {discarded} queued frame(s) on stop");
        }

        let exit = exit?;
        closed?;

        info!(
            "Speaker stopped ({exit:?}), {} chunk(s) played",
            stats.chunks_written
        );

        Ok(self.report(exit, stats, discarded))
    }

    fn report(&self, exit: WorkerExit, stats: PlaybackStats, discarded: usize) -> PlaybackReport {
        PlaybackReport {
            exit,
            chunks_written: stats.chunks_written,
            bytes_written: stats.bytes_written,
            discarded,
            played: self.format.duration_of(stats.bytes_written),
        }
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        if let Err(e) = self.abort() {
            warn!("Error while stopping speaker on drop: {e}");
        }
    }
}
