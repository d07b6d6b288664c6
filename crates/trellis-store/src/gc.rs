//! Reference-counted garbage collection over the record store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use trellis_types::DataId;

use crate::source::RecordSource;
use crate::store::RecordStore;

/// Outcome of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Records erased from the store.
    pub removed: usize,
    /// Candidates kept because a fresh count check found references.
    pub skipped: usize,
    /// True when outstanding holds deferred the sweep; candidates remain
    /// queued for the next run.
    pub deferred: bool,
}

struct GcState {
    counts: HashMap<DataId, usize>,
    candidates: VecDeque<DataId>,
    queued: HashSet<DataId>,
    holds: usize,
}

impl GcState {
    fn enqueue(&mut self, id: DataId) {
        if self.queued.insert(id.clone()) {
            self.candidates.push_back(id);
        }
    }
}

/// Tracks which record ids are externally retained and sweeps the rest.
///
/// Every id the publish path creates is `register`ed here with a count of
/// zero. Retaining a snapshot increments the counts of every id it saw;
/// releasing decrements them. Sweeps only ever erase ids whose count is
/// zero at the moment of deletion; the count is re-read for each candidate,
/// including candidates discovered transitively, so a reference acquired
/// after enqueueing still protects the record.
pub struct GarbageCollector {
    state: Mutex<GcState>,
}

impl GarbageCollector {
    pub fn new() -> Self {
        GarbageCollector {
            state: Mutex::new(GcState {
                counts: HashMap::new(),
                candidates: VecDeque::new(),
                queued: HashSet::new(),
                holds: 0,
            }),
        }
    }

    /// Starts tracking `id` with a reference count of zero. Registering an
    /// already-tracked id keeps its current count.
    pub fn register(&self, id: DataId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counts.entry(id).or_insert(0);
    }

    /// True when `id` is tracked.
    pub fn is_registered(&self, id: &DataId) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        state.counts.contains_key(id)
    }

    /// The current count for `id`, if tracked.
    pub fn reference_count(&self, id: &DataId) -> Option<usize> {
        let state = self.state.lock().expect("lock poisoned");
        state.counts.get(id).copied()
    }

    /// Adds one reference to `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    pub fn increment_reference_count(&self, id: &DataId) {
        let mut state = self.state.lock().expect("lock poisoned");
        let count = state
            .counts
            .get_mut(id)
            .unwrap_or_else(|| panic!("invariant violation: incrementing unregistered id {id}"));
        *count += 1;
    }

    /// Removes one reference from `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered or its count is already zero.
    pub fn decrement_reference_count(&self, id: &DataId) {
        let mut state = self.state.lock().expect("lock poisoned");
        let count = state
            .counts
            .get_mut(id)
            .unwrap_or_else(|| panic!("invariant violation: decrementing unregistered id {id}"));
        if *count == 0 {
            panic!("invariant violation: reference count underflow for {id}");
        }
        *count -= 1;
    }

    /// Enqueues `id` as a sweep candidate.
    pub fn collect_from_node(&self, id: DataId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.enqueue(id);
    }

    /// Enqueues every tracked id whose count is currently zero.
    pub fn collect(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        let zeroes: Vec<DataId> = state
            .counts
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in zeroes {
            state.enqueue(id);
        }
    }

    /// Blocks sweeps until the returned hold is disposed. Counts keep
    /// updating and candidates keep queueing while a hold is out.
    pub fn acquire_hold(self: &Arc<Self>) -> GcHold {
        let mut state = self.state.lock().expect("lock poisoned");
        state.holds += 1;
        debug!(holds = state.holds, "gc hold acquired");
        GcHold {
            gc: Arc::clone(self),
            released: false,
        }
    }

    fn release_hold(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.holds = state
            .holds
            .checked_sub(1)
            .unwrap_or_else(|| panic!("invariant violation: gc hold released twice"));
        debug!(holds = state.holds, "gc hold released");
    }

    /// Sweeps queued candidates out of `store`.
    ///
    /// Each candidate's count is re-read immediately before deletion. A
    /// deleted record's linked ids are enqueued before it is erased, so an
    /// unreferenced subgraph is collected transitively in one run.
    pub fn run(&self, store: &RecordStore) -> SweepReport {
        let mut report = SweepReport::default();
        loop {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.holds > 0 {
                report.deferred = true;
                break;
            }
            let Some(id) = state.candidates.pop_front() else {
                break;
            };
            state.queued.remove(&id);
            match state.counts.get(&id).copied() {
                Some(count) if count > 0 => {
                    report.skipped += 1;
                }
                _ => {
                    // zero references, or a dangling link no publish ever
                    // registered: erase it
                    state.counts.remove(&id);
                    if let Some(entry) = store.get(&id) {
                        if let Some(record) = entry.record() {
                            for child in record.linked_ids() {
                                state.enqueue(child.clone());
                            }
                        }
                        store.remove_record(&id);
                        report.removed += 1;
                    }
                }
            }
        }
        info!(
            removed = report.removed,
            skipped = report.skipped,
            deferred = report.deferred,
            "gc sweep finished"
        );
        report
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        GarbageCollector::new()
    }
}

/// Guard deferring sweeps while alive. Dropping releases the hold;
/// `dispose` releases it explicitly.
pub struct GcHold {
    gc: Arc<GarbageCollector>,
    released: bool,
}

impl GcHold {
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.gc.release_hold();
        }
    }
}

impl Drop for GcHold {
    fn drop(&mut self) {
        self.release();
    }
}
