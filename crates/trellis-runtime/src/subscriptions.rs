//! Snapshot subscriptions: the fan-out from publishes to readers.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use trellis_reader::{read, Snapshot};
use trellis_store::RecordSource;
use trellis_types::DataId;

/// Per-subscriber buffer; a subscriber that lags past this many pending
/// snapshots loses the oldest first.
const CHANNEL_CAPACITY: usize = 16;

struct Subscriber {
    key: Uuid,
    snapshot: Snapshot,
    sender: broadcast::Sender<Snapshot>,
}

/// Registered snapshots and the channels their updates arrive on.
///
/// A publish hands the registry the set of changed ids. Every subscriber
/// whose last snapshot saw one of them is re-read against the store and
/// sent the fresh snapshot, which also becomes its new baseline; everyone
/// else stays silent. Subscribers whose receivers are gone are dropped
/// during the pass.
pub struct SubscriptionRegistry {
    subscribers: RwLock<Vec<Subscriber>>,
    channel_capacity: usize,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        SubscriptionRegistry {
            subscribers: RwLock::new(Vec::new()),
            channel_capacity,
        }
    }

    /// Registers `snapshot` and returns the channel its updates arrive on,
    /// plus a handle that unregisters when disposed or dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        snapshot: Snapshot,
    ) -> (broadcast::Receiver<Snapshot>, SubscriptionHandle) {
        let (sender, receiver) = broadcast::channel(self.channel_capacity);
        let key = Uuid::new_v4();
        self.subscribers
            .write()
            .expect("lock poisoned")
            .push(Subscriber {
                key,
                snapshot,
                sender,
            });
        debug!(%key, "subscription registered");
        let handle = SubscriptionHandle {
            registry: Arc::clone(self),
            key,
            released: false,
        };
        (receiver, handle)
    }

    /// Re-reads and notifies every subscriber that saw a changed id.
    /// Returns how many were sent a fresh snapshot.
    pub fn notify(&self, source: &dyn RecordSource, changed: &HashSet<DataId>) -> usize {
        if changed.is_empty() {
            return 0;
        }
        let mut notified = 0;
        let mut subscribers = self.subscribers.write().expect("lock poisoned");
        subscribers.retain_mut(|subscriber| {
            if !subscriber.snapshot.depends_on(changed) {
                return subscriber.sender.receiver_count() > 0;
            }
            let fresh = read(source, &subscriber.snapshot.selector);
            subscriber.snapshot = fresh.clone();
            if subscriber.sender.send(fresh).is_ok() {
                notified += 1;
                true
            } else {
                false
            }
        });
        notified
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("lock poisoned").len()
    }

    fn unsubscribe(&self, key: Uuid) {
        self.subscribers
            .write()
            .expect("lock poisoned")
            .retain(|subscriber| subscriber.key != key);
        debug!(%key, "subscription removed");
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        SubscriptionRegistry::new()
    }
}

/// Keeps one subscription registered. Disposing (or dropping) removes it.
pub struct SubscriptionHandle {
    registry: Arc<SubscriptionRegistry>,
    key: Uuid,
    released: bool,
}

impl SubscriptionHandle {
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.unsubscribe(self.key);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
