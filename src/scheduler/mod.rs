//! Scheduler facade.
//!
//! [`OfflineScheduler`] wires a network monitor, the offline queue and a
//! user-supplied executor together. Calls made while online settle like a
//! direct executor call; calls made while offline are held in the queue and
//! the caller gets an [`OfflineError`] whose
//! [`watch_offline_change`](OfflineError::watch_offline_change) resolves once
//! the operation has been forwarded after reconnect.

mod config;
mod error;

pub use config::{ConfigError, SchedulerBuilder};
pub use error::{ExecuteError, OfflineError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::network::NetworkStatus;
use crate::queue::OfflineQueue;

/// Schedules operations across connectivity changes.
///
/// All collaborators are injected through [`SchedulerBuilder`]; the scheduler
/// owns no global state. [`init`](Self::init) must run before
/// [`execute`](Self::execute).
pub struct OfflineScheduler<T, R> {
    queue: Arc<OfflineQueue<T, R>>,
    network: Arc<dyn NetworkStatus>,
    online: Arc<AtomicBool>,
    initialized: AtomicBool,
}

impl<T, R> OfflineScheduler<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn from_parts(
        queue: Arc<OfflineQueue<T, R>>,
        network: Arc<dyn NetworkStatus>,
    ) -> Self {
        Self {
            queue,
            network,
            online: Arc::new(AtomicBool::new(false)),
            initialized: AtomicBool::new(false),
        }
    }

    /// Restore persisted operations and start reacting to connectivity
    /// transitions.
    ///
    /// Safe to call more than once; repeated calls warn and do nothing, so a
    /// second init cannot double-restore the queue.
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("scheduler init called more than once, ignoring");
            return;
        }

        self.queue.restore_offline_operations().await;

        let online = !self.network.is_offline().await;
        self.online.store(online, Ordering::SeqCst);

        let mut transitions = self.network.subscribe();
        let queue = Arc::clone(&self.queue);
        let online_flag = Arc::clone(&self.online);
        tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(info) => {
                        online_flag.store(info.online, Ordering::SeqCst);
                        if info.online {
                            tracing::info!("back online, forwarding queued operations");
                            queue.forward_operations().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "missed network transitions");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if online {
            self.queue.forward_operations().await;
        }
    }

    /// Run an operation through the queue.
    ///
    /// Online: resolves with the executor's result, or rejects with the
    /// terminal error. A connectivity failure mid-flight keeps the call
    /// pending until the operation eventually settles. Offline: returns
    /// [`ExecuteError::Offline`] immediately; the held operation completes
    /// after the next transition to online.
    pub async fn execute(&self, op: T) -> Result<R, ExecuteError<R>> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ExecuteError::NotInitialized);
        }

        let enqueued = self.queue.enqueue(op).await;
        if self.online.load(Ordering::SeqCst) {
            match enqueued.receiver.await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(error)) => Err(ExecuteError::Terminal(error)),
                Err(_) => Err(ExecuteError::Cancelled),
            }
        } else {
            Err(ExecuteError::Offline(OfflineError::new(
                enqueued.qid,
                enqueued.receiver,
            )))
        }
    }

    /// The underlying queue, for listener registration and inspection.
    pub fn queue(&self) -> &Arc<OfflineQueue<T, R>> {
        &self.queue
    }

    /// Last observed connectivity state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<T, R> OfflineScheduler<T, R>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    R: Send + 'static,
{
    pub fn builder() -> SchedulerBuilder<T, R> {
        SchedulerBuilder::new()
    }
}
