//! Scheduling strategies.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::queue::NextTask;

/// Decides when queued work actually runs.
///
/// The queue hands the scheduler at most one [`NextTask`] at a time; the
/// next one is issued only after the previous was executed. A scheduler
/// must execute every task it receives exactly once; dropping one rejects
/// the chain it would have driven.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, task: NextTask);
}

/// Runs every task on the spot, on the caller's stack. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl TaskScheduler for ImmediateScheduler {
    fn schedule(&self, task: NextTask) {
        task.execute();
    }
}

/// Parks tasks until the host pumps them, for callers that want to batch
/// work into their own frame or event loop.
#[derive(Default)]
pub struct DeferredScheduler {
    parked: Mutex<VecDeque<NextTask>>,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        DeferredScheduler::default()
    }

    /// Executes the oldest parked task. Returns false when nothing was
    /// parked.
    pub fn run_next(&self) -> bool {
        let task = self.parked.lock().expect("lock poisoned").pop_front();
        match task {
            Some(task) => {
                task.execute();
                true
            }
            None => false,
        }
    }

    /// Pumps until no work is parked, including work scheduled while
    /// pumping.
    pub fn run_all(&self) {
        while self.run_next() {}
    }

    /// Number of parked tasks.
    pub fn parked(&self) -> usize {
        self.parked.lock().expect("lock poisoned").len()
    }
}

impl TaskScheduler for DeferredScheduler {
    fn schedule(&self, task: NextTask) {
        self.parked.lock().expect("lock poisoned").push_back(task);
    }
}
