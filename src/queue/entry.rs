//! Queue entry types.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::executor::ExecutionError;

/// Lifecycle of a queue entry.
///
/// Entries enter as `Queued`, are marked `Forwarding` while the executor
/// runs, and finish as `Completed` or `FailedTerminal`. A network-class
/// failure passes through `FailedRetryable` and back to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Forwarding,
    Completed,
    FailedRetryable,
    FailedTerminal,
}

/// The storable part of a queue entry: the payload plus the metadata the
/// queue needs for readiness decisions. The payload itself is opaque.
#[derive(Debug, Clone)]
pub struct QueueEntryOperation<T> {
    /// Unique id assigned by the queue.
    pub qid: Uuid,
    /// The operation payload, passed through to the executor untouched.
    pub op: T,
    /// Entry this one must wait for, e.g. an update referencing an entity
    /// whose creation has not been confirmed yet.
    pub depends_on: Option<Uuid>,
    /// When the operation was first enqueued.
    pub enqueued_at: DateTime<Utc>,
}

/// Channel half used to settle the original caller's pending result.
pub(crate) type ResultSender<R> = oneshot::Sender<Result<R, ExecutionError>>;

/// An operation waiting in the queue.
///
/// The handler is tied to the caller that enqueued the operation. It cannot
/// be persisted, so entries restored after a restart carry `None` and settle
/// through listeners only.
pub struct QueueEntry<T, R> {
    pub operation: QueueEntryOperation<T>,
    pub(crate) state: EntryState,
    pub(crate) handler: Option<ResultSender<R>>,
}

impl<T, R> QueueEntry<T, R> {
    pub(crate) fn new(operation: QueueEntryOperation<T>, handler: Option<ResultSender<R>>) -> Self {
        Self {
            operation,
            state: EntryState::Queued,
            handler,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }
}

/// Handle returned from an enqueue: the entry id plus the receiver that
/// settles when the entry completes or terminally fails.
pub struct EnqueuedOperation<R> {
    pub qid: Uuid,
    pub receiver: oneshot::Receiver<Result<R, ExecutionError>>,
}
