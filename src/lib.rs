//! Outbox
//!
//! Outbox is a scheduler that queues write operations while an application
//! is offline and fulfills them once it is back online. Operations are held
//! in order, survive restarts through pluggable storage, and are replayed
//! against a user-supplied executor; an optimistic conflict engine
//! reconciles entities whose server state moved while the client was away.

pub mod conflicts;
pub mod executor;
pub mod network;
pub mod queue;
pub mod scheduler;
pub mod storage;

pub use conflicts::{
    ClientWins, ConflictContext, ConflictEngine, ConflictListener, ConflictResolutionResult,
    ConflictResolutionStrategy, MissingVersionPolicy, ObjectConflictError, ObjectStateComparator,
    ObjectStateSnapshot, ServerWins, StateError,
};
pub use executor::{ExecutionError, Executor};
pub use network::{NetworkInfo, NetworkStatus, TcpProbeNetworkStatus, ToggleNetworkStatus};
pub use queue::{
    EnqueuedOperation, EntryState, OfflineQueue, OfflineQueueListener, OfflineQueueOptions,
    QueueEntry, QueueEntryOperation, ResultProcessor,
};
pub use scheduler::{ConfigError, ExecuteError, OfflineError, OfflineScheduler, SchedulerBuilder};
pub use storage::{FileStore, InMemoryStore, PersistentStore, StoreError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
