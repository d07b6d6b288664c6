//! The publish queue: batched mutation of the live store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use trellis_normalizer::normalize;
use trellis_selection::Selector;
use trellis_store::{
    GarbageCollector, MutableRecordSource, RecordSource, RecordSourceMap, RecordStore, UpdateToken,
};
use trellis_types::{DataId, Record, RecordEntry};

use crate::error::RuntimeResult;
use crate::subscriptions::SubscriptionRegistry;

/// A store updater: runs once inside a publish batch, reading through the
/// context and writing into its sink.
pub type StoreUpdater = Box<dyn FnOnce(&mut UpdaterContext<'_>) + Send>;

/// Boxes a closure as a [`StoreUpdater`].
pub fn updater<F>(f: F) -> StoreUpdater
where
    F: FnOnce(&mut UpdaterContext<'_>) + Send + 'static,
{
    Box::new(f)
}

/// Read-through view handed to updaters. Reads see the updater's own
/// writes first, then the store; writes land in a sink, merged
/// copy-on-write against the record they shadow, so an equal-valued write
/// keeps the same allocation and stays invisible to change detection.
pub struct UpdaterContext<'a> {
    store: &'a RecordStore,
    /// Optimistic updaters read the visible state (base plus the layers
    /// below them); commit updaters read the base only.
    optimistic: bool,
    sink: RecordSourceMap,
}

impl<'a> UpdaterContext<'a> {
    fn for_commit(store: &'a RecordStore) -> Self {
        UpdaterContext {
            store,
            optimistic: false,
            sink: RecordSourceMap::new(),
        }
    }

    fn for_optimistic(store: &'a RecordStore) -> Self {
        UpdaterContext {
            store,
            optimistic: true,
            sink: RecordSourceMap::new(),
        }
    }

    /// The entry `id` currently resolves to, shadowed by this updater's
    /// own writes.
    pub fn get(&self, id: &DataId) -> Option<RecordEntry> {
        if let Some(entry) = self.sink.get(id) {
            return Some(entry);
        }
        if self.optimistic {
            self.store.get(id)
        } else {
            self.store.base_entry(id)
        }
    }

    /// Writes `record`, merged over whatever it currently shadows.
    pub fn put(&mut self, record: Record) {
        let id = record.id().clone();
        let current = self.get(&id).and_then(|entry| entry.record().cloned());
        match current {
            Some(existing) => {
                let merged = Record::merge(&existing, &record);
                self.sink.put_entry(id, RecordEntry::Present(merged));
            }
            None => self.sink.put(record),
        }
    }

    /// Tombstones `id`.
    pub fn delete(&mut self, id: DataId) {
        self.sink.delete(id);
    }

    fn into_sink(self) -> RecordSourceMap {
        self.sink
    }
}

enum PendingOperation {
    CommitPayload { selector: Selector, payload: Value },
    CommitUpdate { updater: StoreUpdater },
    ApplyUpdate { token: UpdateToken, updater: StoreUpdater },
    RevertUpdate { token: UpdateToken },
}

/// Counts from one publish run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Payloads normalized and merged into the base.
    pub payloads: usize,
    /// Commit updaters applied.
    pub updates: usize,
    /// Optimistic layers pushed.
    pub applied: usize,
    /// Optimistic layers removed.
    pub reverted: usize,
    /// Ids whose visible record changed over the whole batch.
    pub changed: usize,
    /// Subscribers sent a fresh snapshot.
    pub notified: usize,
}

/// Pending store mutations, applied in enqueue order by [`run`].
///
/// Nothing touches the store until `run`; enqueueing is cheap from any
/// thread. One run is one logical batch: subscribers hear about its net
/// effect at most once, not once per operation.
///
/// [`run`]: PublishQueue::run
#[derive(Default)]
pub struct PublishQueue {
    pending: Mutex<VecDeque<PendingOperation>>,
}

impl PublishQueue {
    pub fn new() -> Self {
        PublishQueue::default()
    }

    /// Queues a server payload shaped like `selector`.
    pub fn commit_payload(&self, selector: Selector, payload: Value) {
        self.push(PendingOperation::CommitPayload { selector, payload });
    }

    /// Queues an updater that writes the base.
    pub fn commit_update(&self, updater: StoreUpdater) {
        self.push(PendingOperation::CommitUpdate { updater });
    }

    /// Queues an optimistic updater; its writes become the layer
    /// identified by `token`.
    pub fn apply_update(&self, token: UpdateToken, updater: StoreUpdater) {
        self.push(PendingOperation::ApplyUpdate { token, updater });
    }

    /// Queues removal of the layer identified by `token`.
    pub fn revert_update(&self, token: UpdateToken) {
        self.push(PendingOperation::RevertUpdate { token });
    }

    /// Operations waiting for the next run.
    pub fn pending(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }

    fn push(&self, operation: PendingOperation) {
        self.pending
            .lock()
            .expect("lock poisoned")
            .push_back(operation);
    }

    /// Applies every queued operation to the store as one batch, then
    /// notifies subscribers.
    ///
    /// Payloads normalize into scratch sinks before anything is applied; a
    /// malformed payload aborts the run with the store untouched, the
    /// offending operation dropped, and the rest requeued for the next
    /// run. Ids the batch creates are registered with `gc`. A subscriber
    /// hears from the batch exactly when a record it saw changed by
    /// reference.
    pub fn run(
        &self,
        store: &RecordStore,
        subscriptions: &SubscriptionRegistry,
        gc: &GarbageCollector,
    ) -> RuntimeResult<PublishReport> {
        let operations: Vec<PendingOperation> = {
            let mut pending = self.pending.lock().expect("lock poisoned");
            pending.drain(..).collect()
        };
        if operations.is_empty() {
            return Ok(PublishReport::default());
        }

        // Normalize every payload before applying anything.
        let mut prepared: Vec<Option<RecordSourceMap>> = Vec::with_capacity(operations.len());
        let mut failure = None;
        for (index, operation) in operations.iter().enumerate() {
            match operation {
                PendingOperation::CommitPayload { selector, payload } => {
                    let mut sink = RecordSourceMap::new();
                    match normalize(&mut sink, selector, payload) {
                        Ok(()) => prepared.push(Some(sink)),
                        Err(error) => {
                            failure = Some((index, error));
                            break;
                        }
                    }
                }
                _ => prepared.push(None),
            }
        }
        if let Some((offender, error)) = failure {
            let mut pending = self.pending.lock().expect("lock poisoned");
            for (index, operation) in operations.into_iter().enumerate().rev() {
                if index != offender {
                    pending.push_front(operation);
                }
            }
            warn!(%error, "publish aborted by malformed payload");
            return Err(error.into());
        }

        let mut report = PublishReport::default();
        let mut before: HashMap<DataId, Option<RecordEntry>> = HashMap::new();
        for (operation, sink) in operations.into_iter().zip(prepared) {
            match operation {
                PendingOperation::CommitPayload { .. } => {
                    let sink = sink.expect("normalized above");
                    capture(store, sink.ids(), &mut before);
                    for id in store.commit_sink(sink) {
                        gc.register(id);
                    }
                    report.payloads += 1;
                }
                PendingOperation::CommitUpdate { updater } => {
                    let mut context = UpdaterContext::for_commit(store);
                    updater(&mut context);
                    let sink = context.into_sink();
                    capture(store, sink.ids(), &mut before);
                    for id in store.commit_sink(sink) {
                        gc.register(id);
                    }
                    report.updates += 1;
                }
                PendingOperation::ApplyUpdate { token, updater } => {
                    let mut context = UpdaterContext::for_optimistic(store);
                    updater(&mut context);
                    let sink = context.into_sink();
                    let ids = sink.ids();
                    capture(store, ids.clone(), &mut before);
                    for id in ids {
                        gc.register(id);
                    }
                    store.push_layer(token, sink);
                    report.applied += 1;
                }
                PendingOperation::RevertUpdate { token } => {
                    capture(store, store.layer_ids(token).unwrap_or_default(), &mut before);
                    store.remove_layer(token);
                    report.reverted += 1;
                }
            }
        }

        let changed: HashSet<DataId> = before
            .into_iter()
            .filter(|(id, earlier)| entry_changed(earlier, &store.get(id)))
            .map(|(id, _)| id)
            .collect();
        report.changed = changed.len();
        report.notified = subscriptions.notify(store, &changed);
        info!(
            payloads = report.payloads,
            updates = report.updates,
            applied = report.applied,
            reverted = report.reverted,
            changed = report.changed,
            notified = report.notified,
            "publish applied"
        );
        Ok(report)
    }
}

/// Records the visible entry for each id the first time the batch touches
/// it; the change set compares against these once the batch is done.
fn capture(
    store: &RecordStore,
    ids: Vec<DataId>,
    before: &mut HashMap<DataId, Option<RecordEntry>>,
) {
    for id in ids {
        if !before.contains_key(&id) {
            let entry = store.get(&id);
            before.insert(id, entry);
        }
    }
}

fn entry_changed(earlier: &Option<RecordEntry>, now: &Option<RecordEntry>) -> bool {
    match (earlier, now) {
        (Some(a), Some(b)) => !a.ptr_eq(b),
        (None, None) => false,
        _ => true,
    }
}
