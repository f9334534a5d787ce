//! Scheduler configuration.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::executor::Executor;
use crate::network::{NetworkStatus, ToggleNetworkStatus};
use crate::queue::serializer::{JsonOperationSerializer, OperationSerializer};
use crate::queue::store::OfflineStore;
use crate::queue::{OfflineQueue, OfflineQueueListener, OfflineQueueOptions, ResultProcessor};
use crate::storage::PersistentStore;

use super::OfflineScheduler;

/// Errors raised while wiring a scheduler. All of them are reported at
/// [`SchedulerBuilder::build`], before any operation is accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("an executor is required to build a scheduler")]
    MissingExecutor,
}

/// Dependency-injected construction of an [`OfflineScheduler`].
///
/// Only the executor is mandatory. By default the scheduler assumes it is
/// online until told otherwise (a [`ToggleNetworkStatus`] the host can drive)
/// and keeps its queue in memory only.
pub struct SchedulerBuilder<T, R> {
    executor: Option<Arc<dyn Executor<T, R>>>,
    network: Option<Arc<dyn NetworkStatus>>,
    storage: Option<Arc<dyn PersistentStore>>,
    serializer: Option<Arc<dyn OperationSerializer<T>>>,
    listeners: Vec<Arc<dyn OfflineQueueListener<T, R>>>,
    processors: Vec<Arc<dyn ResultProcessor<T, R>>>,
}

impl<T, R> SchedulerBuilder<T, R>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            executor: None,
            network: None,
            storage: None,
            serializer: None,
            listeners: Vec::new(),
            processors: Vec::new(),
        }
    }

    /// The function that performs queued operations once forwarded.
    pub fn executor(mut self, executor: Arc<dyn Executor<T, R>>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Connectivity source; defaults to an online [`ToggleNetworkStatus`].
    pub fn network_status(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = Some(network);
        self
    }

    /// Durable storage for the queue; without one, queued operations do not
    /// survive a restart.
    pub fn storage(mut self, storage: Arc<dyn PersistentStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Storable-form conversion; defaults to plain JSON.
    pub fn serializer(mut self, serializer: Arc<dyn OperationSerializer<T>>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn OfflineQueueListener<T, R>>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn result_processor(mut self, processor: Arc<dyn ResultProcessor<T, R>>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn build(self) -> Result<OfflineScheduler<T, R>, ConfigError> {
        let executor = self.executor.ok_or(ConfigError::MissingExecutor)?;
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(ToggleNetworkStatus::new(true)));

        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(JsonOperationSerializer));
        let store = self
            .storage
            .map(|storage| OfflineStore::new(storage, serializer));

        let queue = OfflineQueue::new(
            executor,
            OfflineQueueOptions {
                store,
                network: Some(Arc::clone(&network)),
                listeners: self.listeners,
                processors: self.processors,
            },
        );

        Ok(OfflineScheduler::from_parts(Arc::new(queue), network))
    }
}

impl<T, R> Default for SchedulerBuilder<T, R>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
