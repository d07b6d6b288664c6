//! The environment: one handle over the whole cache.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use trellis_diff::subtract_resolved;
use trellis_reader::{read, Snapshot};
use trellis_sched::{step, Completion, ImmediateScheduler, TaskQueue, TaskScheduler};
use trellis_selection::{Operation, Selection, Selector};
use trellis_store::{GarbageCollector, GcHold, QueryPath, RecordStore, SweepReport, UpdateToken};
use trellis_types::DataId;

use crate::error::{RuntimeError, RuntimeResult};
use crate::network::{CacheConfig, Network};
use crate::publish::{PublishQueue, PublishReport, StoreUpdater};
use crate::subscriptions::{SubscriptionHandle, SubscriptionRegistry};

/// One handle over the whole cache: store, publish queue, subscriptions,
/// garbage collector, task queue, and network.
///
/// Clones share the same cache. Every mutation funnels through the task
/// queue, so commits, optimistic windows, stream payloads, and sweeps land
/// in one serial order no matter which clone issued them.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

struct EnvironmentInner {
    network: Arc<dyn Network>,
    store: Arc<RecordStore>,
    publish: Arc<PublishQueue>,
    subscriptions: Arc<SubscriptionRegistry>,
    gc: Arc<GarbageCollector>,
    tasks: TaskQueue,
    /// Operations whose payloads have fully landed, per anchor; the
    /// subtraction inputs for later fetches.
    completed: Mutex<Vec<Selector>>,
    optimistic: Mutex<OptimisticWindow>,
}

/// Outstanding optimistic layers, and the hold that parks sweeps while
/// any exist.
struct OptimisticWindow {
    outstanding: usize,
    hold: Option<GcHold>,
}

impl Environment {
    /// An environment that executes tasks inline as they are enqueued.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Environment::with_scheduler(network, Arc::new(ImmediateScheduler))
    }

    pub fn with_scheduler(network: Arc<dyn Network>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Environment {
            inner: Arc::new(EnvironmentInner {
                network,
                store: Arc::new(RecordStore::new()),
                publish: Arc::new(PublishQueue::new()),
                subscriptions: Arc::new(SubscriptionRegistry::new()),
                gc: Arc::new(GarbageCollector::new()),
                tasks: TaskQueue::new(scheduler),
                completed: Mutex::new(Vec::new()),
                optimistic: Mutex::new(OptimisticWindow {
                    outstanding: 0,
                    hold: None,
                }),
            }),
        }
    }

    // ---- Reading ----

    /// Reads `selector` against the visible store state.
    pub fn lookup(&self, selector: &Selector) -> Snapshot {
        read(self.inner.store.as_ref(), selector)
    }

    /// Protects everything `snapshot` saw from collection until the
    /// returned handle is disposed or dropped. Ids the read found missing
    /// are protected too, so data that arrives later is not swept out from
    /// under the waiting reader.
    pub fn retain(&self, snapshot: &Snapshot) -> RetainHandle {
        let ids: Vec<DataId> = snapshot.seen_ids().cloned().collect();
        for id in &ids {
            self.inner.gc.register(id.clone());
            self.inner.gc.increment_reference_count(id);
        }
        debug!(records = ids.len(), "snapshot retained");
        RetainHandle {
            environment: self.clone(),
            ids,
            released: false,
        }
    }

    /// Watches everything `snapshot` saw. A fresh snapshot arrives on the
    /// receiver whenever a publish changes a record it depends on.
    pub fn subscribe(
        &self,
        snapshot: Snapshot,
    ) -> (broadcast::Receiver<Snapshot>, SubscriptionHandle) {
        self.inner.subscriptions.subscribe(snapshot)
    }

    // ---- Writing ----

    /// Commits a server payload shaped like `selector`.
    pub async fn commit_payload(
        &self,
        selector: Selector,
        payload: Value,
    ) -> RuntimeResult<PublishReport> {
        self.inner.publish.commit_payload(selector, payload);
        self.publish_now().await
    }

    /// Commits an updater against the base.
    pub async fn commit_update(&self, updater: StoreUpdater) -> RuntimeResult<PublishReport> {
        self.inner.publish.commit_update(updater);
        self.publish_now().await
    }

    /// Applies an optimistic updater. Its writes are visible until the
    /// returned handle is disposed or dropped; a failed publish cancels
    /// the update.
    pub async fn apply_update(&self, updater: StoreUpdater) -> RuntimeResult<OptimisticHandle> {
        let token = UpdateToken::new();
        self.open_optimistic_window();
        self.inner.publish.apply_update(token, updater);
        match self.publish_now().await {
            Ok(_) => Ok(OptimisticHandle {
                environment: self.clone(),
                token,
                released: false,
            }),
            Err(error) => {
                // The layer may still be queued behind the failure; cancel
                // it and close the window before surfacing the error.
                self.inner.publish.revert_update(token);
                drop(self.schedule_publish());
                self.close_optimistic_window();
                Err(error)
            }
        }
    }

    /// Applies everything queued on the publish queue as one batch.
    /// Subscribers hear about the net effect at most once.
    pub async fn flush(&self) -> RuntimeResult<PublishReport> {
        self.publish_now().await
    }

    // ---- Fetching ----

    /// Serves `selector` from the cache when complete; otherwise fetches
    /// what is missing, trimmed by previously completed operations,
    /// commits it, and reads again.
    pub async fn execute(
        &self,
        selector: &Selector,
        cache_config: CacheConfig,
    ) -> RuntimeResult<Snapshot> {
        if !cache_config.force {
            let cached = self.lookup(selector);
            if !cached.is_missing_data {
                debug!(operation = %selector.operation.name, "served from cache");
                return Ok(cached);
            }
        }
        let request = if cache_config.force {
            selector.clone()
        } else {
            self.residual_request(selector)
        };
        let payload = self.inner.network.fetch(&request, cache_config).await?;
        self.inner.publish.commit_payload(request.clone(), payload);
        self.publish_now().await?;
        self.record_completed(request);
        let snapshot = self.lookup(selector);
        if !snapshot.is_missing_data {
            self.record_completed(selector.clone());
        }
        info!(operation = %selector.operation.name, "operation executed");
        Ok(snapshot)
    }

    /// Executes `selector` over the streaming transport, committing every
    /// payload as it arrives; subscribers hear each one. Resolves with the
    /// final snapshot once the stream closes.
    pub async fn execute_stream(
        &self,
        selector: &Selector,
        cache_config: CacheConfig,
    ) -> RuntimeResult<Snapshot> {
        let mut stream = self
            .inner
            .network
            .execute_stream(selector, cache_config)
            .await;
        let mut received = 0usize;
        while let Some(item) = stream.payloads.recv().await {
            let payload = item?;
            self.inner.publish.commit_payload(selector.clone(), payload);
            self.publish_now().await?;
            received += 1;
        }
        info!(
            operation = %selector.operation.name,
            payloads = received,
            "stream complete"
        );
        if received > 0 {
            self.record_completed(selector.clone());
        }
        Ok(self.lookup(selector))
    }

    /// Reloads one record through the smallest server-addressable query:
    /// `node(id:)` when the target has a server id, otherwise the target's
    /// path down from the nearest refetchable root.
    pub async fn refetch(
        &self,
        path: &QueryPath,
        target: &DataId,
        selections: Vec<Selection>,
    ) -> RuntimeResult<Snapshot> {
        let request = path.refetch_operation(target, selections)?;
        let payload = self
            .inner
            .network
            .fetch(&request, CacheConfig::forced())
            .await?;
        self.inner.publish.commit_payload(request.clone(), payload);
        self.publish_now().await?;
        Ok(self.lookup(&request))
    }

    // ---- Maintenance ----

    /// Sweeps every unreferenced record, transitively. Runs as a task so
    /// it cannot interleave with a publish.
    pub async fn collect(&self) -> RuntimeResult<SweepReport> {
        let gc = Arc::clone(&self.inner.gc);
        let store = Arc::clone(&self.inner.store);
        let completion = self.inner.tasks.enqueue(vec![step(move |_| {
            gc.collect();
            let report = gc.run(&store);
            serde_json::to_value(&report).map_err(|error| error.to_string())
        })]);
        let value = completion.wait().await?;
        Ok(serde_json::from_value(value)?)
    }

    // ---- Accessors ----

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.inner.store
    }

    pub fn publish_queue(&self) -> &Arc<PublishQueue> {
        &self.inner.publish
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.inner.subscriptions
    }

    pub fn garbage_collector(&self) -> &Arc<GarbageCollector> {
        &self.inner.gc
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.inner.tasks
    }

    // ---- Internals ----

    /// Schedules one publish run; nothing waits on it.
    fn schedule_publish(&self) -> Completion {
        let publish = Arc::clone(&self.inner.publish);
        let store = Arc::clone(&self.inner.store);
        let subscriptions = Arc::clone(&self.inner.subscriptions);
        let gc = Arc::clone(&self.inner.gc);
        self.inner.tasks.enqueue(vec![step(move |_| {
            let report = publish
                .run(&store, &subscriptions, &gc)
                .map_err(|error| error.to_string())?;
            serde_json::to_value(&report).map_err(|error| error.to_string())
        })])
    }

    /// Schedules one publish run and waits for it, keeping the typed
    /// error the queue boundary would otherwise flatten to a string.
    async fn publish_now(&self) -> RuntimeResult<PublishReport> {
        let publish = Arc::clone(&self.inner.publish);
        let store = Arc::clone(&self.inner.store);
        let subscriptions = Arc::clone(&self.inner.subscriptions);
        let gc = Arc::clone(&self.inner.gc);
        let slot: Arc<Mutex<Option<RuntimeError>>> = Arc::new(Mutex::new(None));
        let failed = Arc::clone(&slot);
        let completion = self.inner.tasks.enqueue(vec![step(move |_| {
            match publish.run(&store, &subscriptions, &gc) {
                Ok(report) => serde_json::to_value(&report).map_err(|error| error.to_string()),
                Err(error) => {
                    let message = error.to_string();
                    *failed.lock().expect("lock poisoned") = Some(error);
                    Err(message)
                }
            }
        })]);
        match completion.wait().await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(task_error) => {
                let typed = slot.lock().expect("lock poisoned").take();
                Err(typed.unwrap_or_else(|| task_error.into()))
            }
        }
    }

    fn revert(&self, token: UpdateToken) {
        self.inner.publish.revert_update(token);
        drop(self.schedule_publish());
        self.close_optimistic_window();
    }

    fn residual_request(&self, selector: &Selector) -> Selector {
        let completed = self.inner.completed.lock().expect("lock poisoned");
        let mut residual = Some(selector.selections().to_vec());
        for past in completed
            .iter()
            .filter(|past| past.data_id == selector.data_id)
        {
            let Some(current) = residual.take() else {
                break;
            };
            residual = subtract_resolved(
                &current,
                &selector.variables,
                past.selections(),
                &past.variables,
            );
        }
        drop(completed);
        match residual {
            Some(selections) => Selector::new(
                Operation::new(selector.operation.name.clone(), selections),
                selector.data_id.clone(),
                selector.variables.clone(),
            ),
            // Completed operations say the cache covers this selector, yet
            // the read missed; the backing records were collected. Fetch
            // the whole thing again.
            None => selector.clone(),
        }
    }

    fn record_completed(&self, selector: Selector) {
        let mut completed = self.inner.completed.lock().expect("lock poisoned");
        if !completed.iter().any(|past| *past == selector) {
            completed.push(selector);
        }
    }

    fn open_optimistic_window(&self) {
        let mut window = self.inner.optimistic.lock().expect("lock poisoned");
        window.outstanding += 1;
        if window.outstanding == 1 {
            window.hold = Some(self.inner.gc.acquire_hold());
            debug!("optimistic window opened; sweeps parked");
        }
    }

    fn close_optimistic_window(&self) {
        let mut window = self.inner.optimistic.lock().expect("lock poisoned");
        window.outstanding = window
            .outstanding
            .checked_sub(1)
            .expect("invariant violation: optimistic window closed twice");
        if window.outstanding == 0 {
            if let Some(hold) = window.hold.take() {
                hold.dispose();
            }
            debug!("optimistic window closed");
        }
    }
}

/// Holds reference counts for every record one snapshot saw. Disposing
/// (or dropping) releases them and queues newly unreferenced ids for the
/// next sweep.
pub struct RetainHandle {
    environment: Environment,
    ids: Vec<DataId>,
    released: bool,
}

impl RetainHandle {
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let gc = &self.environment.inner.gc;
            for id in &self.ids {
                gc.decrement_reference_count(id);
                if gc.reference_count(id) == Some(0) {
                    gc.collect_from_node(id.clone());
                }
            }
            debug!(records = self.ids.len(), "snapshot released");
        }
    }
}

impl Drop for RetainHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// One optimistic update. Disposing (or dropping) reverts it: the layer
/// disappears and subscribers hear about whatever visibly changed.
pub struct OptimisticHandle {
    environment: Environment,
    token: UpdateToken,
    released: bool,
}

impl OptimisticHandle {
    pub fn token(&self) -> UpdateToken {
        self.token
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.environment.revert(self.token);
        }
    }
}

impl Drop for OptimisticHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use trellis_normalizer::NormalizeError;
    use trellis_selection::{LinkedField, ScalarField};
    use trellis_store::RecordSource;
    use trellis_types::{Record, Variables};

    use crate::network::{NetworkError, StaticNetwork};
    use crate::publish::updater;

    fn viewer_selector() -> Selector {
        Selector::root(
            Operation::new(
                "ViewerQuery",
                vec![LinkedField::new("me")
                    .select(vec![
                        ScalarField::new("id").into(),
                        ScalarField::new("name").into(),
                    ])
                    .into()],
            ),
            Variables::new(),
        )
    }

    fn profile_selector(fields: &[&str]) -> Selector {
        let mut children: Vec<Selection> = vec![ScalarField::new("id").requisite().into()];
        for field in fields {
            children.push(ScalarField::new(*field).into());
        }
        Selector::root(
            Operation::new(
                "ProfileQuery",
                vec![LinkedField::new("me").select(children).into()],
            ),
            Variables::new(),
        )
    }

    fn rename_user(id: &'static str, name: &'static str) -> StoreUpdater {
        updater(move |context| {
            let mut record = Record::with_type(DataId::new(id), "User");
            record.set_scalar("name", json!(name));
            context.put(record);
        })
    }

    fn static_environment() -> Environment {
        Environment::new(Arc::new(StaticNetwork::new()))
    }

    #[tokio::test]
    async fn commit_read_release_collect_lifecycle() {
        let environment = static_environment();
        let selector = viewer_selector();
        environment
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Zuck"}}))
            .await
            .unwrap();

        let snapshot = environment.lookup(&selector);
        assert!(!snapshot.is_missing_data);
        assert_eq!(snapshot.data, json!({"me": {"id": "1", "name": "Zuck"}}));

        let retained = environment.retain(&snapshot);
        let report = environment.collect().await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(!environment.lookup(&selector).is_missing_data);

        retained.dispose();
        let report = environment.collect().await.unwrap();
        assert_eq!(report.removed, 2);

        let after = environment.lookup(&selector);
        assert!(after.is_missing_data);
        assert_eq!(after.data, json!(null));
    }

    #[tokio::test]
    async fn optimistic_update_notifies_on_apply_and_revert_only() {
        let environment = static_environment();
        let selector = viewer_selector();
        // committed fields match the updater's record exactly, __typename
        // included, so the no-op case below merges to the same allocation
        environment
            .commit_payload(
                selector.clone(),
                json!({"me": {"id": "1", "__typename": "User", "name": "Mark"}}),
            )
            .await
            .unwrap();
        let (mut receiver, _subscription) = environment.subscribe(environment.lookup(&selector));

        let pending = environment
            .apply_update(rename_user("1", "Pending"))
            .await
            .unwrap();
        assert_eq!(
            environment.lookup(&selector).data["me"]["name"],
            json!("Pending")
        );
        assert_eq!(
            receiver.try_recv().unwrap().data["me"]["name"],
            json!("Pending")
        );

        pending.dispose();
        assert_eq!(
            environment.lookup(&selector).data["me"]["name"],
            json!("Mark")
        );
        assert_eq!(
            receiver.try_recv().unwrap().data["me"]["name"],
            json!("Mark")
        );

        // An optimistic value equal to the committed one is no effective
        // change; neither applying nor reverting it makes a sound.
        let noop = environment
            .apply_update(rename_user("1", "Mark"))
            .await
            .unwrap();
        noop.dispose();
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn optimistic_window_parks_sweeps() {
        let environment = static_environment();
        let selector = viewer_selector();
        environment
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Zuck"}}))
            .await
            .unwrap();

        let pending = environment
            .apply_update(rename_user("1", "Pending"))
            .await
            .unwrap();
        let report = environment.collect().await.unwrap();
        assert!(report.deferred);
        assert_eq!(report.removed, 0);
        assert!(!environment.lookup(&selector).is_missing_data);

        pending.dispose();
        let report = environment.collect().await.unwrap();
        assert!(!report.deferred);
        assert_eq!(report.removed, 2);
        assert!(environment.lookup(&selector).is_missing_data);
    }

    #[tokio::test]
    async fn execute_fetches_once_then_serves_from_cache() {
        let network = Arc::new(StaticNetwork::new());
        network.respond("ViewerQuery", json!({"me": {"id": "1", "name": "Zuck"}}));
        let environment = Environment::new(network.clone());
        let selector = viewer_selector();

        let snapshot = environment
            .execute(&selector, CacheConfig::default())
            .await
            .unwrap();
        assert!(!snapshot.is_missing_data);
        assert_eq!(network.fetch_count(), 1);

        let again = environment
            .execute(&selector, CacheConfig::default())
            .await
            .unwrap();
        assert_eq!(again.data["me"]["name"], json!("Zuck"));
        assert_eq!(network.fetch_count(), 1);

        network.respond("ViewerQuery", json!({"me": {"id": "1", "name": "Mark"}}));
        let forced = environment
            .execute(&selector, CacheConfig::forced())
            .await
            .unwrap();
        assert_eq!(forced.data["me"]["name"], json!("Mark"));
        assert_eq!(network.fetch_count(), 2);
    }

    #[tokio::test]
    async fn execute_fetches_only_the_missing_fields() {
        let network = Arc::new(StaticNetwork::new());
        let environment = Environment::new(network.clone());

        network.respond("ProfileQuery", json!({"me": {"id": "1", "name": "Zuck"}}));
        environment
            .execute(&profile_selector(&["name"]), CacheConfig::default())
            .await
            .unwrap();

        // The canned response satisfies only the residual; normalizing it
        // under the full selection would fail on the missing name.
        network.respond("ProfileQuery", json!({"me": {"id": "1", "age": 40}}));
        let snapshot = environment
            .execute(&profile_selector(&["name", "age"]), CacheConfig::default())
            .await
            .unwrap();
        assert!(!snapshot.is_missing_data);
        assert_eq!(
            snapshot.data,
            json!({"me": {"id": "1", "name": "Zuck", "age": 40}})
        );
        assert_eq!(network.fetch_count(), 2);
    }

    #[tokio::test]
    async fn execute_surfaces_fetch_failures() {
        let environment = static_environment();
        let error = environment
            .execute(&viewer_selector(), CacheConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(error, RuntimeError::Network(NetworkError::Fetch(_))));
    }

    #[tokio::test]
    async fn execute_stream_commits_each_payload() {
        let network = Arc::new(StaticNetwork::new());
        network.stream(
            "ViewerQuery",
            vec![
                Ok(json!({"me": {"id": "1", "name": "Zuck"}})),
                Ok(json!({"me": {"id": "1", "name": "Mark"}})),
            ],
        );
        let environment = Environment::new(network);
        let selector = viewer_selector();
        let (mut receiver, _subscription) = environment.subscribe(environment.lookup(&selector));

        let snapshot = environment
            .execute_stream(&selector, CacheConfig::default())
            .await
            .unwrap();
        assert_eq!(snapshot.data["me"]["name"], json!("Mark"));
        assert_eq!(
            receiver.try_recv().unwrap().data["me"]["name"],
            json!("Zuck")
        );
        assert_eq!(
            receiver.try_recv().unwrap().data["me"]["name"],
            json!("Mark")
        );
    }

    #[tokio::test]
    async fn stream_errors_keep_earlier_payloads() {
        let network = Arc::new(StaticNetwork::new());
        network.stream(
            "ViewerQuery",
            vec![
                Ok(json!({"me": {"id": "1", "name": "Zuck"}})),
                Err(NetworkError::Stream("connection reset".into())),
            ],
        );
        let environment = Environment::new(network);
        let selector = viewer_selector();

        let error = environment
            .execute_stream(&selector, CacheConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            RuntimeError::Network(NetworkError::Stream(_))
        ));
        assert_eq!(
            environment.lookup(&selector).data["me"]["name"],
            json!("Zuck")
        );
    }

    #[tokio::test]
    async fn commit_payload_surfaces_the_malformed_field() {
        let environment = static_environment();
        let error = environment
            .commit_payload(viewer_selector(), json!({"me": {"id": "1"}}))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            RuntimeError::Normalize(NormalizeError::MissingField { .. })
        ));
        assert!(environment.store().is_empty());
    }

    #[tokio::test]
    async fn flush_applies_queued_operations_as_one_batch() {
        let environment = static_environment();
        let selector = viewer_selector();
        let (mut receiver, _subscription) = environment.subscribe(environment.lookup(&selector));

        environment
            .publish_queue()
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Zuck"}}));
        environment
            .publish_queue()
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Mark"}}));
        let report = environment.flush().await.unwrap();

        assert_eq!(report.payloads, 2);
        assert_eq!(report.notified, 1);
        assert_eq!(
            receiver.try_recv().unwrap().data["me"]["name"],
            json!("Mark")
        );
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn commit_updater_runs_through_the_task_queue() {
        let environment = static_environment();
        let selector = viewer_selector();
        environment
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Zuck"}}))
            .await
            .unwrap();

        let report = environment
            .commit_update(rename_user("1", "Zuck Jr."))
            .await
            .unwrap();
        assert_eq!(report.updates, 1);
        assert_eq!(
            environment.lookup(&selector).data["me"]["name"],
            json!("Zuck Jr.")
        );
    }

    #[tokio::test]
    async fn refetch_reloads_one_record_through_node() {
        let network = Arc::new(StaticNetwork::new());
        let environment = Environment::new(network.clone());
        let selector = viewer_selector();
        environment
            .commit_payload(selector.clone(), json!({"me": {"id": "1", "name": "Zuck"}}))
            .await
            .unwrap();

        // the synthesized query selects the identity fields, so the
        // response has to carry them
        network.respond(
            "RefetchQuery",
            json!({"node": {"id": "1", "__typename": "User", "name": "Priscilla"}}),
        );
        let path = QueryPath::root(DataId::root());
        let snapshot = environment
            .refetch(
                &path,
                &DataId::new("1"),
                vec![ScalarField::new("name").into()],
            )
            .await
            .unwrap();
        assert!(!snapshot.is_missing_data);
        assert_eq!(snapshot.data["node"]["name"], json!("Priscilla"));
        assert_eq!(
            environment.lookup(&selector).data["me"]["name"],
            json!("Priscilla")
        );
    }

    #[tokio::test]
    async fn retaining_a_missing_read_is_safe() {
        let environment = static_environment();
        let snapshot = environment.lookup(&viewer_selector());
        assert!(snapshot.is_missing_data);

        let retained = environment.retain(&snapshot);
        retained.dispose();
        let report = environment.collect().await.unwrap();
        assert_eq!(report.removed, 0);
    }
}
