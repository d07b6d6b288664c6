//! The task queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{TaskError, TaskResult};
use crate::scheduler::TaskScheduler;

/// One unit of work in a chain. Receives the previous step's value (`Null`
/// for the first step); an `Err` short-circuits the rest of the chain.
pub type TaskStep = Box<dyn FnOnce(Value) -> Result<Value, String> + Send>;

/// Boxes a closure as a [`TaskStep`].
pub fn step<F>(f: F) -> TaskStep
where
    F: FnOnce(Value) -> Result<Value, String> + Send + 'static,
{
    Box::new(f)
}

struct Chain {
    steps: VecDeque<TaskStep>,
    completion: oneshot::Sender<TaskResult<Value>>,
}

struct QueueState {
    chains: VecDeque<Chain>,
    /// A chain is currently running its steps.
    executing: bool,
    /// A `NextTask` is out with the scheduler.
    scheduled: bool,
    /// Insertion point for chains enqueued during execution: position 0
    /// right after the running chain, then one past the previous nested
    /// insert, so nested enqueues keep their relative order.
    nested_cursor: usize,
}

struct QueueInner {
    state: Mutex<QueueState>,
    scheduler: Arc<dyn TaskScheduler>,
}

/// FIFO chains of steps, executed one chain at a time through a
/// [`TaskScheduler`].
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl TaskQueue {
    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        TaskQueue {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    chains: VecDeque::new(),
                    executing: false,
                    scheduled: false,
                    nested_cursor: 0,
                }),
                scheduler,
            }),
        }
    }

    /// A queue over the inline [`ImmediateScheduler`].
    ///
    /// [`ImmediateScheduler`]: crate::scheduler::ImmediateScheduler
    pub fn immediate() -> Self {
        TaskQueue::new(Arc::new(crate::scheduler::ImmediateScheduler))
    }

    /// Queues a chain of steps and returns its completion.
    ///
    /// Called outside of execution, the chain goes to the back of the
    /// queue. Called from inside a running step, it goes ahead of
    /// everything that was queued before execution started.
    pub fn enqueue(&self, steps: Vec<TaskStep>) -> Completion {
        let (completion, receiver) = oneshot::channel();
        let chain = Chain {
            steps: steps.into(),
            completion,
        };
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.executing {
                let cursor = state.nested_cursor.min(state.chains.len());
                state.chains.insert(cursor, chain);
                state.nested_cursor = cursor + 1;
                debug!(position = cursor, "task enqueued during execution");
            } else {
                state.chains.push_back(chain);
                debug!(pending = state.chains.len(), "task enqueued");
            }
        }
        QueueInner::schedule_if_needed(&self.inner);
        Completion { receiver }
    }

    /// Chains currently waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().expect("lock poisoned").chains.len()
    }
}

impl QueueInner {
    fn schedule_if_needed(inner: &Arc<QueueInner>) {
        let should_schedule = {
            let mut state = inner.state.lock().expect("lock poisoned");
            if !state.scheduled && !state.executing && !state.chains.is_empty() {
                state.scheduled = true;
                true
            } else {
                false
            }
        };
        // the scheduler runs outside the lock: it may execute inline
        if should_schedule {
            let scheduler = Arc::clone(&inner.scheduler);
            scheduler.schedule(NextTask {
                inner: Arc::clone(inner),
                consumed: false,
            });
        }
    }

    /// Runs exactly one chain to completion, then hands the scheduler a
    /// fresh task if more work is waiting.
    fn process(inner: &Arc<QueueInner>) {
        let mut chain = {
            let mut state = inner.state.lock().expect("lock poisoned");
            state.scheduled = false;
            let Some(chain) = state.chains.pop_front() else {
                return;
            };
            state.executing = true;
            state.nested_cursor = 0;
            chain
        };

        let mut value = Value::Null;
        let mut failed = None;
        while let Some(step) = chain.steps.pop_front() {
            match step(std::mem::take(&mut value)) {
                Ok(next) => value = next,
                Err(message) => {
                    failed = Some(message);
                    break;
                }
            }
        }

        {
            let mut state = inner.state.lock().expect("lock poisoned");
            state.executing = false;
            state.nested_cursor = 0;
        }

        let result = match failed {
            None => Ok(value),
            Some(message) => {
                debug!(error = %message, "task chain failed");
                Err(TaskError::Failed(message))
            }
        };
        // the caller may have dropped its completion; that is fine
        let _ = chain.completion.send(result);

        Self::schedule_if_needed(inner);
    }

    fn abandon_front(inner: &Arc<QueueInner>) {
        let chain = {
            let mut state = inner.state.lock().expect("lock poisoned");
            state.scheduled = false;
            state.chains.pop_front()
        };
        if let Some(chain) = chain {
            warn!("scheduler dropped a task; rejecting its chain");
            let _ = chain.completion.send(Err(TaskError::Abandoned));
        }
        Self::schedule_if_needed(inner);
    }
}

/// A single grant of execution, handed to the scheduler.
///
/// Consuming `execute` makes running it twice unrepresentable; dropping it
/// unexecuted rejects the chain it would have driven and lets the queue
/// move on.
pub struct NextTask {
    inner: Arc<QueueInner>,
    consumed: bool,
}

impl NextTask {
    pub fn execute(mut self) {
        self.consumed = true;
        QueueInner::process(&self.inner);
    }
}

impl Drop for NextTask {
    fn drop(&mut self) {
        if !self.consumed {
            QueueInner::abandon_front(&self.inner);
        }
    }
}

/// The pending result of an enqueued chain: the last step's value, or the
/// first error.
pub struct Completion {
    receiver: oneshot::Receiver<TaskResult<Value>>,
}

impl Completion {
    /// Waits for the chain to finish.
    pub async fn wait(self) -> TaskResult<Value> {
        self.receiver.await.unwrap_or(Err(TaskError::Abandoned))
    }

    /// The result, if the chain has already finished.
    pub fn try_result(&mut self) -> Option<TaskResult<Value>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::Abandoned)),
        }
    }
}
