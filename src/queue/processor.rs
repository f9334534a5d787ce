//! Post-completion hooks over the remaining queue.

use super::entry::{QueueEntry, QueueEntryOperation};

/// Rewrites still-queued operations after one completes.
///
/// The canonical use is id reconciliation: an entity created while offline
/// carries a client-generated id, and updates queued behind it reference
/// that id. Once the create completes, a processor can substitute the
/// server-assigned id into the pending operations.
pub trait ResultProcessor<T, R>: Send + Sync {
    fn execute(
        &self,
        pending: &mut [QueueEntry<T, R>],
        completed: &QueueEntryOperation<T>,
        result: &R,
    );
}
