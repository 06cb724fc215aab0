//! FIFO of audio chunks between producers and the playback worker.
//!
//! Backed by a `crossbeam-channel` so the consumer gets a blocking receive
//! with timeout instead of a busy polling loop. The end-of-stream sentinel
//! travels through the same channel, which lets the worker tell "no data
//! right now" apart from "no more data ever".

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};

use crate::chunk::AudioChunk;
use crate::constants::POLL_TIMEOUT;
use crate::error::SpeakerError;
use crate::signal::{FinishedSignal, StopSignal};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Audio(AudioChunk),
    /// No more chunks will arrive for this utterance.
    EndOfStream,
}

/// Result of [`FrameQueue::get`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Poll {
    Chunk(AudioChunk),
    End,
    /// Nothing arrived within the timeout.
    Empty,
}

/// Thread-safe FIFO of [`Frame`]s, bounded or unbounded.
///
/// Clones share the same underlying channel. The queue holds both channel
/// halves itself, so it never disconnects while any clone is alive.
#[derive(Clone)]
pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    capacity: Option<usize>,
}

impl FrameQueue {
    pub fn unbounded() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        FrameQueue {
            tx,
            rx,
            capacity: None,
        }
    }

    /// Bounded queue; producers block while `capacity` frames are queued.
    ///
    /// A zero capacity would turn the queue into a rendezvous channel, so it
    /// is raised to one.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        FrameQueue {
            tx,
            rx,
            capacity: Some(capacity),
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::unbounded(),
        }
    }

    /// Append a chunk, blocking while the queue is bounded and full.
    pub fn put(&self, chunk: AudioChunk) {
        self.send(Frame::Audio(chunk));
    }

    /// Append the end-of-stream sentinel.
    pub fn put_end(&self) {
        self.send(Frame::EndOfStream);
    }

    fn send(&self, frame: Frame) {
        if self.tx.send(frame).is_err() {
            // Unreachable while self.rx is alive
            error!("FrameQueue receiver vanished, dropping frame");
        }
    }

    /// Try to append within `timeout`, handing the frame back if the queue
    /// stayed full.
    pub fn offer(&self, frame: Frame, timeout: Duration) -> Result<(), Frame> {
        match self.tx.send_timeout(frame, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(frame)) | Err(SendTimeoutError::Disconnected(frame)) => {
                Err(frame)
            }
        }
    }

    /// Remove the oldest frame, waiting at most `timeout` for one to arrive.
    pub fn get(&self, timeout: Duration) -> Poll {
        match self.rx.recv_timeout(timeout) {
            Ok(Frame::Audio(chunk)) => Poll::Chunk(chunk),
            Ok(Frame::EndOfStream) => Poll::End,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Poll::Empty,
        }
    }

    /// Whether the queue currently holds nothing. Racy by nature; only use
    /// it for idle detection.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Discard everything currently queued and return how many frames were
    /// dropped.
    pub fn clear(&self) -> usize {
        let mut discarded = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => discarded += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        discarded
    }
}

/// Producer end of a [`FrameQueue`] for threads that must not outlive the
/// session they feed.
///
/// Sends wait in `POLL_TIMEOUT` slices and give up with
/// [`SpeakerError::Cancelled`] once the stop signal is set, or with
/// [`SpeakerError::WorkerExited`] once the watched playback worker is gone.
#[derive(Clone)]
pub struct Producer {
    queue: FrameQueue,
    stop: StopSignal,
    worker: Option<Arc<FinishedSignal>>,
    retry: Duration,
}

impl Producer {
    pub fn new(queue: FrameQueue, stop: StopSignal) -> Self {
        Producer {
            queue,
            stop,
            worker: None,
            retry: POLL_TIMEOUT,
        }
    }

    /// Also give up once the worker behind `finished` has exited.
    pub fn watching(mut self, finished: Arc<FinishedSignal>) -> Self {
        self.worker = Some(finished);
        self
    }

    /// Whether there is still a point in producing.
    pub fn check(&self) -> Result<(), SpeakerError> {
        if self.stop.is_stopped() {
            return Err(SpeakerError::Cancelled);
        }
        match &self.worker {
            Some(finished) if !finished.is_worker_alive() => Err(SpeakerError::WorkerExited),
            _ => Ok(()),
        }
    }

    /// Enqueue `frame`, blocking while the queue is full.
    pub fn send(&self, frame: Frame) -> Result<(), SpeakerError> {
        self.check()?;

        let mut frame = frame;
        loop {
            match self.queue.offer(frame, self.retry) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    self.check()?;
                    frame = returned;
                }
            }
        }
    }
}
