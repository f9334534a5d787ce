//! Scheduler error surface.

use std::error::Error;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::executor::ExecutionError;

type ResultReceiver<R> = oneshot::Receiver<Result<R, ExecutionError>>;

/// Returned when an operation was accepted while offline.
///
/// The original call settles immediately with this error so the caller is
/// not blocked; the eventual outcome can be awaited through
/// [`watch_offline_change`](Self::watch_offline_change) once connectivity
/// returns.
pub struct OfflineError<R> {
    qid: Uuid,
    receiver: Mutex<Option<ResultReceiver<R>>>,
}

impl<R> OfflineError<R> {
    pub(crate) fn new(qid: Uuid, receiver: ResultReceiver<R>) -> Self {
        Self {
            qid,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Always true; mirrors the error's meaning for callers that only probe.
    pub fn offline(&self) -> bool {
        true
    }

    /// Queue id of the held operation.
    pub fn qid(&self) -> Uuid {
        self.qid
    }

    /// Wait for the queued operation to complete after reconnect.
    ///
    /// Consumes the pending result: the first call gets it, any further call
    /// reports [`ExecuteError::AlreadyWatched`].
    pub async fn watch_offline_change(&self) -> Result<R, ExecuteError<R>> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or(ExecuteError::AlreadyWatched)?;
        match receiver.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(ExecuteError::Terminal(error)),
            Err(_) => Err(ExecuteError::Cancelled),
        }
    }
}

impl<R> fmt::Debug for OfflineError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineError")
            .field("qid", &self.qid)
            .finish()
    }
}

impl<R> fmt::Display for OfflineError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation {} was queued while offline; watch for completion after reconnect",
            self.qid
        )
    }
}

impl<R> Error for OfflineError<R> {}

/// Errors surfaced by [`OfflineScheduler::execute`](super::OfflineScheduler::execute)
/// and by watching a held operation.
pub enum ExecuteError<R> {
    /// `init` was never called.
    NotInitialized,
    /// The client is offline; the operation is queued.
    Offline(OfflineError<R>),
    /// The executor rejected the operation for non-connectivity reasons.
    Terminal(ExecutionError),
    /// The pending result was already consumed by an earlier watch.
    AlreadyWatched,
    /// The queue dropped the operation without settling it.
    Cancelled,
}

impl<R> ExecuteError<R> {
    /// True when the operation was held because the client is offline.
    pub fn is_offline(&self) -> bool {
        matches!(self, ExecuteError::Offline(_))
    }
}

impl<R> fmt::Debug for ExecuteError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::NotInitialized => write!(f, "NotInitialized"),
            ExecuteError::Offline(e) => f.debug_tuple("Offline").field(e).finish(),
            ExecuteError::Terminal(e) => f.debug_tuple("Terminal").field(e).finish(),
            ExecuteError::AlreadyWatched => write!(f, "AlreadyWatched"),
            ExecuteError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl<R> fmt::Display for ExecuteError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::NotInitialized => {
                write!(f, "scheduler used before init() was called")
            }
            ExecuteError::Offline(e) => fmt::Display::fmt(e, f),
            ExecuteError::Terminal(e) => write!(f, "operation failed: {e}"),
            ExecuteError::AlreadyWatched => {
                write!(f, "pending result was already consumed by an earlier watch")
            }
            ExecuteError::Cancelled => write!(f, "operation was dropped before completing"),
        }
    }
}

impl<R> Error for ExecuteError<R> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExecuteError::Terminal(e) => Some(e),
            _ => None,
        }
    }
}
