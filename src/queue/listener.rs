//! Queue lifecycle notifications.

use super::entry::QueueEntryOperation;
use crate::executor::ExecutionError;

/// Hooks fired around queue state transitions.
///
/// Every method has a default empty body, so implementors pick the events
/// they care about. Listeners are observation-only: a panicking listener is
/// logged and ignored and never blocks the queue's own transitions.
#[allow(unused_variables)]
pub trait OfflineQueueListener<T, R>: Send + Sync {
    /// A new operation entered the queue.
    fn on_operation_enqueued(&self, operation: &QueueEntryOperation<T>) {}

    /// An operation went back to the queue: restored after a restart, or
    /// re-queued after a network-class failure.
    fn on_operation_requeued(&self, operation: &QueueEntryOperation<T>) {}

    /// An operation was forwarded successfully.
    fn on_operation_success(&self, operation: &QueueEntryOperation<T>, result: &R) {}

    /// An operation failed terminally and left the queue.
    fn on_operation_failure(&self, operation: &QueueEntryOperation<T>, error: &ExecutionError) {}

    /// The last pending operation left the queue.
    fn on_queue_cleared(&self) {}
}
