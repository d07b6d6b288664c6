//! Ordered task execution for the Trellis cache.
//!
//! Everything that mutates the store is funneled through a [`TaskQueue`]:
//! chains of steps that run strictly one at a time, in a predictable order,
//! under a caller-supplied scheduling strategy. The queue decides *what*
//! runs next; the [`TaskScheduler`] decides *when*, receiving an opaque
//! [`NextTask`] it must execute exactly once.
//!
//! Two orderings matter. Chains enqueued outside of execution run FIFO.
//! A chain enqueued *during* execution runs after the current chain but
//! ahead of everything queued before it started, so work spawned by a task
//! lands next instead of at the back of the line.

pub mod error;
pub mod queue;
pub mod scheduler;

pub use error::{TaskError, TaskResult};
pub use queue::{step, Completion, NextTask, TaskQueue, TaskStep};
pub use scheduler::{DeferredScheduler, ImmediateScheduler, TaskScheduler};
