//! Main-thread dispatch queue.
//!
//! Background completions may present UI, so they are posted here and run
//! by whichever thread owns the UI when it drains the queue.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::trace;

/// Work item for the main thread
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// FIFO queue of tasks for the main thread
#[derive(Clone)]
pub struct MainQueue {
    tx: Sender<MainTask>,
    rx: Receiver<MainTask>,
}

impl MainQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Post a task; never blocks
    pub fn dispatch<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(Box::new(task));
    }

    /// Run every task queued so far; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!("Ran {} main-queue tasks", ran);
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("pending", &self.pending())
            .finish()
    }
}
