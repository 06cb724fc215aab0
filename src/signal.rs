//! Cooperative shutdown flags shared by the worker, the bridge and the
//! receiver. Nothing here interrupts a blocking call; every loop has to
//! reach a check point to notice a stop request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// One-way stop flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct FinishedState {
    finished: bool,
    worker_alive: bool,
}

/// Raised by the playback worker once an utterance has fully drained.
///
/// Waiters are also woken when the worker exits without draining, so
/// nobody blocks on a dead worker.
#[derive(Debug, Default)]
pub struct FinishedSignal {
    state: Mutex<FinishedState>,
    cond: Condvar,
}

impl FinishedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FinishedState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(e) => e.into_inner(),
        }
    }

    pub fn set(&self) {
        self.lock().finished = true;
        self.cond.notify_all();
    }

    /// Forget a previous utterance's completion.
    pub fn clear(&self) {
        self.lock().finished = false;
    }

    pub fn is_set(&self) -> bool {
        self.lock().finished
    }

    pub(crate) fn worker_started(&self) {
        let mut state = self.lock();
        state.finished = false;
        state.worker_alive = true;
    }

    pub(crate) fn worker_exited(&self) {
        self.lock().worker_alive = false;
        self.cond.notify_all();
    }

    pub fn is_worker_alive(&self) -> bool {
        self.lock().worker_alive
    }

    /// Block until the signal is set or the worker is gone. Returns whether
    /// the signal was set.
    pub fn wait(&self) -> bool {
        let mut state = self.lock();
        while !state.finished && state.worker_alive {
            state = match self.cond.wait(state) {
                Ok(state) => state,
                Err(e) => e.into_inner(),
            };
        }
        state.finished
    }
}

/// Marks the worker as exited when dropped, including during a panic
/// unwind.
pub(crate) struct AliveGuard(pub(crate) Arc<FinishedSignal>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}
