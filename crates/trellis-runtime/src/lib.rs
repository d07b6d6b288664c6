//! The client runtime over the Trellis cache.
//!
//! [`Environment`] ties the subsystems together: reads come back as
//! snapshot trees, writes go through the publish queue, change fan-out
//! through the subscription registry, reclamation through the garbage
//! collector, and fetches through the [`Network`] seam, with every store
//! mutation serialized on a task queue.

pub mod environment;
pub mod error;
pub mod network;
pub mod publish;
pub mod subscriptions;

pub use environment::{Environment, OptimisticHandle, RetainHandle};
pub use error::{RuntimeError, RuntimeResult};
pub use network::{
    CacheConfig, Network, NetworkError, NetworkResult, PayloadStream, StaticNetwork, StreamCancel,
};
pub use publish::{updater, PublishQueue, PublishReport, StoreUpdater, UpdaterContext};
pub use subscriptions::{SubscriptionHandle, SubscriptionRegistry};

// Re-export key types
pub use trellis_reader::Snapshot;
pub use trellis_selection::{Operation, Selector};
pub use trellis_store::{QueryPath, SweepReport, UpdateToken};
pub use trellis_types::{DataId, Record};
