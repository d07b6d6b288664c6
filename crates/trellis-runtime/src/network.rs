//! The network boundary: how operations leave the cache.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use trellis_selection::Selector;

/// Per-request cache policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Skip cached data and residual trimming: always fetch the full query.
    pub force: bool,
}

impl CacheConfig {
    pub fn forced() -> Self {
        CacheConfig { force: true }
    }
}

/// A fetch that could not produce a payload.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("stream failed: {0}")]
    Stream(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Cancels delivery of payloads not yet received. Idempotent; transports
/// poll [`is_disposed`](StreamCancel::is_disposed) between payloads and
/// stop sending once set.
#[derive(Clone, Debug, Default)]
pub struct StreamCancel {
    disposed: Arc<AtomicBool>,
}

impl StreamCancel {
    pub fn new() -> Self {
        StreamCancel::default()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// An incremental response: payloads arrive in order until the server
/// completes, an error is delivered, or `cancel` is disposed.
pub struct PayloadStream {
    pub payloads: mpsc::Receiver<NetworkResult<Value>>,
    pub cancel: StreamCancel,
}

/// Transport seam for executing operations against a server.
///
/// The cache has no opinion on the wire; implementations own batching,
/// retries, and authentication. `fetch` resolves to exactly one payload
/// shaped like the selector; `execute_stream` delivers one payload per
/// server turn for subscriptions and live queries.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, selector: &Selector, cache_config: CacheConfig) -> NetworkResult<Value>;
    async fn execute_stream(&self, selector: &Selector, cache_config: CacheConfig)
        -> PayloadStream;
}

/// A network serving canned payloads keyed by operation name.
///
/// Responses queue per operation and are consumed in order; a fetch with
/// nothing queued fails. Streams are consumed whole. Used in tests and as
/// a seam for offline hosts.
#[derive(Default)]
pub struct StaticNetwork {
    responses: Mutex<HashMap<String, VecDeque<Value>>>,
    streams: Mutex<HashMap<String, Vec<NetworkResult<Value>>>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticNetwork {
    pub fn new() -> Self {
        StaticNetwork::default()
    }

    /// Queues the next payload served for `operation`.
    pub fn respond(&self, operation: &str, payload: Value) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .entry(operation.to_string())
            .or_default()
            .push_back(payload);
    }

    /// Sets the payload sequence streamed for `operation`.
    pub fn stream(&self, operation: &str, payloads: Vec<NetworkResult<Value>>) {
        self.streams
            .lock()
            .expect("lock poisoned")
            .insert(operation.to_string(), payloads);
    }

    /// Operation names fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().expect("lock poisoned").clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, selector: &Selector, _cache_config: CacheConfig) -> NetworkResult<Value> {
        self.fetched
            .lock()
            .expect("lock poisoned")
            .push(selector.operation.name.clone());
        self.responses
            .lock()
            .expect("lock poisoned")
            .get_mut(&selector.operation.name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                NetworkError::Fetch(format!(
                    "no response queued for `{}`",
                    selector.operation.name
                ))
            })
    }

    async fn execute_stream(
        &self,
        selector: &Selector,
        _cache_config: CacheConfig,
    ) -> PayloadStream {
        let items = self
            .streams
            .lock()
            .expect("lock poisoned")
            .remove(&selector.operation.name)
            .unwrap_or_default();
        // Canned payloads are "already transmitted": buffer them all and
        // close, leaving nothing for the cancel handle to suppress.
        let (sender, receiver) = mpsc::channel(items.len().max(1));
        for item in items {
            let _ = sender.try_send(item);
        }
        PayloadStream {
            payloads: receiver,
            cancel: StreamCancel::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_selection::{Operation, ScalarField};
    use trellis_types::Variables;

    fn version_selector(name: &str) -> Selector {
        Selector::root(
            Operation::new(name, vec![ScalarField::new("version").into()]),
            Variables::new(),
        )
    }

    #[tokio::test]
    async fn serves_queued_responses_in_order() {
        let network = StaticNetwork::new();
        network.respond("Q", json!({"version": 1}));
        network.respond("Q", json!({"version": 2}));

        let selector = version_selector("Q");
        let config = CacheConfig::default();
        assert_eq!(
            network.fetch(&selector, config).await,
            Ok(json!({"version": 1}))
        );
        assert_eq!(
            network.fetch(&selector, config).await,
            Ok(json!({"version": 2}))
        );
        assert!(matches!(
            network.fetch(&selector, config).await,
            Err(NetworkError::Fetch(_))
        ));
        assert_eq!(network.fetched(), vec!["Q", "Q", "Q"]);
    }

    #[tokio::test]
    async fn streams_deliver_in_order_then_close() {
        let network = StaticNetwork::new();
        network.stream(
            "S",
            vec![Ok(json!({"version": 1})), Ok(json!({"version": 2}))],
        );

        let mut stream = network
            .execute_stream(&version_selector("S"), CacheConfig::default())
            .await;
        assert_eq!(stream.payloads.recv().await, Some(Ok(json!({"version": 1}))));
        assert_eq!(stream.payloads.recv().await, Some(Ok(json!({"version": 2}))));
        assert_eq!(stream.payloads.recv().await, None);
    }

    #[test]
    fn cancel_is_idempotent() {
        let cancel = StreamCancel::new();
        assert!(!cancel.is_disposed());
        cancel.dispose();
        cancel.dispose();
        assert!(cancel.is_disposed());
    }
}
