//! The live record store: a base source under a stack of optimistic layers.

use std::fmt;
use std::sync::RwLock;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use trellis_types::{DataId, Record, RecordEntry};

use crate::error::StoreResult;
use crate::source::{MutableRecordSource, RecordSource, RecordSourceMap};

/// Handle identifying one optimistic layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateToken(Uuid);

impl UpdateToken {
    pub fn new() -> Self {
        UpdateToken(Uuid::new_v4())
    }
}

impl Default for UpdateToken {
    fn default() -> Self {
        UpdateToken::new()
    }
}

impl fmt::Debug for UpdateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateToken({})", self.0)
    }
}

impl fmt::Display for UpdateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct OptimisticLayer {
    token: UpdateToken,
    sink: RecordSourceMap,
}

struct StoreState {
    base: RecordSourceMap,
    /// Bottom to top; later layers shadow earlier ones.
    layers: Vec<OptimisticLayer>,
}

/// The live store.
///
/// Reads resolve through the optimistic layers top-down, then the base.
/// All mutation funnels through the publish path ([`commit_sink`],
/// [`push_layer`], [`remove_layer`]) and the garbage collector
/// ([`remove_record`]); nothing else writes here.
///
/// [`commit_sink`]: RecordStore::commit_sink
/// [`push_layer`]: RecordStore::push_layer
/// [`remove_layer`]: RecordStore::remove_layer
/// [`remove_record`]: RecordStore::remove_record
pub struct RecordStore {
    state: RwLock<StoreState>,
}

impl RecordStore {
    pub fn new() -> Self {
        RecordStore {
            state: RwLock::new(StoreState {
                base: RecordSourceMap::new(),
                layers: Vec::new(),
            }),
        }
    }

    /// Merges a committed sink into the base source, record by record.
    ///
    /// Existing records merge copy-on-write; tombstones in the sink
    /// tombstone the base entry. Returns the ids the sink created, ids the
    /// base had no entry for before this call.
    pub fn commit_sink(&self, sink: RecordSourceMap) -> Vec<DataId> {
        let mut state = self.state.write().expect("lock poisoned");
        let mut created = Vec::new();
        let mut merged = 0usize;
        for (id, entry) in sink.entries() {
            if !state.base.has(id) {
                created.push(id.clone());
            }
            match entry {
                RecordEntry::Present(next) => {
                    let existing = state.base.get(id).and_then(|e| e.record().cloned());
                    match existing {
                        Some(current) => {
                            let updated = Record::merge(&current, next.as_ref());
                            state
                                .base
                                .put_entry(id.clone(), RecordEntry::Present(updated));
                        }
                        None => {
                            state.base.put_entry(id.clone(), entry.clone());
                        }
                    }
                }
                RecordEntry::Deleted => state.base.delete(id.clone()),
            }
            merged += 1;
        }
        debug!(records = merged, created = created.len(), "sink committed");
        created
    }

    /// Pushes an optimistic layer on top of the stack.
    pub fn push_layer(&self, token: UpdateToken, sink: RecordSourceMap) {
        let mut state = self.state.write().expect("lock poisoned");
        debug!(%token, records = sink.len(), "optimistic layer pushed");
        state.layers.push(OptimisticLayer { token, sink });
    }

    /// Removes the layer identified by `token` wherever it sits in the
    /// stack, returning its sink. Layers above it are unaffected.
    ///
    /// # Panics
    ///
    /// Panics if no layer carries `token`; reverting twice or reverting a
    /// token from another store is a caller bug.
    pub fn remove_layer(&self, token: UpdateToken) -> RecordSourceMap {
        let mut state = self.state.write().expect("lock poisoned");
        let position = state
            .layers
            .iter()
            .position(|layer| layer.token == token)
            .unwrap_or_else(|| panic!("invariant violation: reverting unknown update {token}"));
        let layer = state.layers.remove(position);
        debug!(%token, records = layer.sink.len(), "optimistic layer removed");
        layer.sink
    }

    /// Number of optimistic layers currently applied.
    pub fn optimistic_layer_count(&self) -> usize {
        self.state.read().expect("lock poisoned").layers.len()
    }

    /// The ids written by the layer identified by `token`, if it exists.
    pub fn layer_ids(&self, token: UpdateToken) -> Option<Vec<DataId>> {
        let state = self.state.read().expect("lock poisoned");
        state
            .layers
            .iter()
            .find(|layer| layer.token == token)
            .map(|layer| layer.sink.ids())
    }

    /// The base entry for `id`, ignoring optimistic layers. Commit
    /// updaters read here; only [`RecordSource::get`] sees layered state.
    pub fn base_entry(&self, id: &DataId) -> Option<RecordEntry> {
        self.state.read().expect("lock poisoned").base.get(id)
    }

    /// Erases `id` from the base source. Garbage-collector use.
    pub fn remove_record(&self, id: &DataId) {
        let mut state = self.state.write().expect("lock poisoned");
        state.base.remove(id);
    }

    /// Serializes the base source (optimistic layers excluded) for host
    /// debugging.
    pub fn to_json(&self) -> StoreResult<Value> {
        self.state.read().expect("lock poisoned").base.to_json()
    }

    fn lookup(state: &StoreState, id: &DataId) -> Option<RecordEntry> {
        for layer in state.layers.iter().rev() {
            if let Some(entry) = layer.sink.get(id) {
                return Some(entry);
            }
        }
        state.base.get(id)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        RecordStore::new()
    }
}

impl RecordSource for RecordStore {
    /// The visible entry for `id`: topmost layer holding it, else the base.
    fn get(&self, id: &DataId) -> Option<RecordEntry> {
        let state = self.state.read().expect("lock poisoned");
        Self::lookup(&state, id)
    }

    fn ids(&self) -> Vec<DataId> {
        let state = self.state.read().expect("lock poisoned");
        let mut ids = state.base.ids();
        for layer in &state.layers {
            for id in layer.sink.ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn len(&self) -> usize {
        self.ids().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, name: &str) -> Record {
        let mut record = Record::with_type(DataId::new(id), "User");
        record.set_scalar("name", json!(name));
        record
    }

    fn sink_with(records: Vec<Record>) -> RecordSourceMap {
        let mut sink = RecordSourceMap::new();
        for record in records {
            sink.put(record);
        }
        sink
    }

    fn visible_name(store: &RecordStore, id: &str) -> Option<Value> {
        store
            .get(&DataId::new(id))
            .and_then(|entry| entry.record().cloned())
            .and_then(|record| record.get("name").and_then(|v| v.as_scalar().cloned()))
    }

    #[test]
    fn commit_reports_created_ids_only_once() {
        let store = RecordStore::new();
        let created = store.commit_sink(sink_with(vec![user("4", "Mark")]));
        assert_eq!(created, vec![DataId::new("4")]);

        let created = store.commit_sink(sink_with(vec![user("4", "Zuck"), user("5", "Pri")]));
        assert_eq!(created, vec![DataId::new("5")]);
        assert_eq!(visible_name(&store, "4"), Some(json!("Zuck")));
    }

    #[test]
    fn commit_merges_instead_of_replacing() {
        let store = RecordStore::new();
        let mut full = user("4", "Mark");
        full.set_scalar("age", json!(30));
        store.commit_sink(sink_with(vec![full]));

        // a later sink knows only the name
        store.commit_sink(sink_with(vec![user("4", "Zuck")]));

        let record = store.get(&DataId::new("4")).unwrap();
        let record = record.record().unwrap();
        assert_eq!(record.get("age").unwrap().as_scalar(), Some(&json!(30)));
        assert_eq!(record.get("name").unwrap().as_scalar(), Some(&json!("Zuck")));
    }

    #[test]
    fn unchanged_commit_keeps_the_same_allocation() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        let before = store.get(&DataId::new("4")).unwrap();

        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        let after = store.get(&DataId::new("4")).unwrap();
        assert!(before.ptr_eq(&after));
    }

    #[test]
    fn layers_shadow_top_down_and_pop_in_any_order() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));

        let lower = UpdateToken::new();
        let upper = UpdateToken::new();
        store.push_layer(lower, sink_with(vec![user("4", "Lower")]));
        store.push_layer(upper, sink_with(vec![user("4", "Upper")]));
        assert_eq!(visible_name(&store, "4"), Some(json!("Upper")));

        // removing the lower layer leaves the upper one in force
        store.remove_layer(lower);
        assert_eq!(visible_name(&store, "4"), Some(json!("Upper")));

        store.remove_layer(upper);
        assert_eq!(visible_name(&store, "4"), Some(json!("Mark")));
        assert_eq!(store.optimistic_layer_count(), 0);
    }

    #[test]
    fn base_entry_ignores_layers() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        store.push_layer(UpdateToken::new(), sink_with(vec![user("4", "Pending")]));
        assert_eq!(visible_name(&store, "4"), Some(json!("Pending")));

        let base = store.base_entry(&DataId::new("4")).unwrap();
        let base = base.record().unwrap();
        assert_eq!(base.get("name").unwrap().as_scalar(), Some(&json!("Mark")));
        assert!(store.base_entry(&DataId::new("9")).is_none());
    }

    #[test]
    fn layer_tombstone_hides_a_base_record() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));

        let token = UpdateToken::new();
        let mut sink = RecordSourceMap::new();
        sink.delete(DataId::new("4"));
        store.push_layer(token, sink);

        assert!(matches!(
            store.get(&DataId::new("4")),
            Some(RecordEntry::Deleted)
        ));
        store.remove_layer(token);
        assert!(matches!(
            store.get(&DataId::new("4")),
            Some(RecordEntry::Present(_))
        ));
    }

    #[test]
    fn commit_sink_tombstone_deletes_in_base() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        let mut sink = RecordSourceMap::new();
        sink.delete(DataId::new("4"));
        store.commit_sink(sink);
        assert!(matches!(
            store.get(&DataId::new("4")),
            Some(RecordEntry::Deleted)
        ));
    }

    #[test]
    #[should_panic(expected = "invariant violation")]
    fn removing_an_unknown_layer_panics() {
        let store = RecordStore::new();
        store.remove_layer(UpdateToken::new());
    }

    #[test]
    fn ids_unions_base_and_layers() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        store.push_layer(UpdateToken::new(), sink_with(vec![user("4", "X"), user("9", "New")]));

        let mut ids = store.ids();
        ids.sort();
        assert_eq!(ids, vec![DataId::new("4"), DataId::new("9")]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_reads_through_the_source_trait() {
        let store = RecordStore::new();
        store.commit_sink(sink_with(vec![user("4", "Mark")]));
        let source: &dyn RecordSource = &store;
        assert!(source.has(&DataId::new("4")));
        let entry = source.get(&DataId::new("4")).unwrap();
        assert_eq!(entry.record().map(|r| r.id().clone()), Some(DataId::new("4")));
    }
}
