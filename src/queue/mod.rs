//! Persistent offline operation queue.
//!
//! The queue holds write operations while the client is offline and forwards
//! them, in enqueue order, once connectivity returns. Entries survive process
//! restarts through the [`store::OfflineStore`] persistence layer; the
//! in-memory list remains the source of truth for the running process, so a
//! persistence failure is logged and absorbed rather than surfaced.

mod entry;
mod listener;
mod processor;
pub mod serializer;
pub mod store;

pub use entry::{EnqueuedOperation, EntryState, QueueEntry, QueueEntryOperation};
pub use listener::OfflineQueueListener;
pub use processor::ResultProcessor;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::executor::{ExecutionError, Executor};
use crate::network::NetworkStatus;
use store::OfflineStore;

/// Collaborators handed to the queue at construction.
pub struct OfflineQueueOptions<T, R> {
    /// Persistence layer; `None` keeps the queue memory-only.
    pub store: Option<OfflineStore<T>>,
    /// Connectivity source consulted at enqueue time. `None` means the
    /// caller drives forwarding explicitly.
    pub network: Option<Arc<dyn NetworkStatus>>,
    pub listeners: Vec<Arc<dyn OfflineQueueListener<T, R>>>,
    pub processors: Vec<Arc<dyn ResultProcessor<T, R>>>,
}

impl<T, R> Default for OfflineQueueOptions<T, R> {
    fn default() -> Self {
        Self {
            store: None,
            network: None,
            listeners: Vec::new(),
            processors: Vec::new(),
        }
    }
}

/// Ordered, durable queue of pending operations.
///
/// At most one forwarding pass runs at a time; entries are attempted in
/// enqueue order except those blocked on an unresolved dependency, which are
/// skipped and picked up again once the dependency leaves the queue.
pub struct OfflineQueue<T, R> {
    entries: Mutex<Vec<QueueEntry<T, R>>>,
    store: Option<OfflineStore<T>>,
    listeners: Mutex<Vec<Arc<dyn OfflineQueueListener<T, R>>>>,
    processors: Vec<Arc<dyn ResultProcessor<T, R>>>,
    executor: Arc<dyn Executor<T, R>>,
    network: Option<Arc<dyn NetworkStatus>>,
    forwarding: AtomicBool,
}

impl<T, R> OfflineQueue<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub fn new(executor: Arc<dyn Executor<T, R>>, options: OfflineQueueOptions<T, R>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            store: options.store,
            listeners: Mutex::new(options.listeners),
            processors: options.processors,
            executor,
            network: options.network,
            forwarding: AtomicBool::new(false),
        }
    }

    /// Enqueue an operation and receive a handle that settles when the
    /// operation completes or terminally fails.
    ///
    /// The entry is persisted best-effort, listeners are notified
    /// synchronously, and when the network reports online a forwarding pass
    /// starts right away.
    pub async fn enqueue(&self, op: T) -> EnqueuedOperation<R> {
        self.enqueue_internal(op, None).await
    }

    /// Enqueue an operation that must not be forwarded until the entry with
    /// id `depends_on` has left the queue.
    pub async fn enqueue_dependent(&self, op: T, depends_on: Uuid) -> EnqueuedOperation<R> {
        self.enqueue_internal(op, Some(depends_on)).await
    }

    async fn enqueue_internal(&self, op: T, depends_on: Option<Uuid>) -> EnqueuedOperation<R> {
        let (tx, rx) = oneshot::channel();
        let operation = QueueEntryOperation {
            qid: Uuid::new_v4(),
            op,
            depends_on,
            enqueued_at: Utc::now(),
        };

        {
            let mut entries = self.entries.lock().unwrap();
            entries.push(QueueEntry::new(operation.clone(), Some(tx)));
        }
        tracing::debug!(qid = %operation.qid, "operation enqueued");
        self.notify(|l| l.on_operation_enqueued(&operation));

        if let Some(store) = &self.store {
            if let Err(error) = store.save_entry(&operation).await {
                tracing::warn!(
                    qid = %operation.qid,
                    error = %error,
                    "failed to persist queue entry, keeping it in memory"
                );
            }
        }

        let qid = operation.qid;
        if operation.depends_on.is_none() && self.is_online().await {
            self.forward_operations().await;
        }

        EnqueuedOperation { qid, receiver: rx }
    }

    /// Forward pending operations to the executor.
    ///
    /// Idempotent: when a pass is already running this call is a no-op. The
    /// pass walks entries in order, skipping blocked ones, and stops early on
    /// a network-class failure since later entries would fail the same way.
    pub async fn forward_operations(&self) {
        if self.forwarding.swap(true, Ordering::SeqCst) {
            tracing::debug!("forwarding pass already in progress");
            return;
        }

        while let Some(operation) = self.next_ready() {
            tracing::debug!(qid = %operation.qid, "forwarding operation");
            match self.executor.execute(operation.op.clone()).await {
                Ok(result) => self.complete(operation, result).await,
                Err(error) if error.is_network() => {
                    self.mark(operation.qid, EntryState::FailedRetryable);
                    self.requeue(&operation, &error);
                    break;
                }
                Err(error) => self.fail(operation, error).await,
            }
        }

        self.forwarding.store(false, Ordering::SeqCst);
    }

    /// Rebuild the queue from persisted records, in stored order.
    ///
    /// Restored entries have no caller waiting on them; their outcomes are
    /// reported through listeners only. Restore failures are logged and
    /// absorbed so a corrupt store cannot take the queue down.
    pub async fn restore_offline_operations(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let records = match store.load_entries().await {
            Ok(records) => records,
            Err(error) => {
                tracing::error!(error = %error, "failed to restore offline queue");
                return;
            }
        };

        let restored: Vec<QueueEntryOperation<T>> =
            records.into_iter().map(|r| r.into_operation()).collect();
        {
            let mut entries = self.entries.lock().unwrap();
            for operation in &restored {
                entries.push(QueueEntry::new(operation.clone(), None));
            }
        }
        for operation in &restored {
            self.notify(|l| l.on_operation_requeued(operation));
        }
        if !restored.is_empty() {
            tracing::info!(count = restored.len(), "restored offline operations");
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn OfflineQueueListener<T, R>>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Snapshot of pending operations in queue order.
    pub fn pending_operations(&self) -> Vec<QueueEntryOperation<T>> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.operation.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Pick the first queued entry whose dependency is no longer pending and
    /// mark it as forwarding.
    fn next_ready(&self) -> Option<QueueEntryOperation<T>> {
        let mut entries = self.entries.lock().unwrap();
        let pending: Vec<Uuid> = entries.iter().map(|e| e.operation.qid).collect();
        let idx = entries.iter().position(|e| {
            e.state == EntryState::Queued
                && e.operation
                    .depends_on
                    .map_or(true, |dep| !pending.contains(&dep))
        })?;
        entries[idx].state = EntryState::Forwarding;
        Some(entries[idx].operation.clone())
    }

    async fn complete(&self, operation: QueueEntryOperation<T>, result: R) {
        self.mark(operation.qid, EntryState::Completed);
        let (handler, now_empty) = {
            let mut entries = self.entries.lock().unwrap();
            let handler = take_entry(&mut entries, operation.qid);
            for processor in &self.processors {
                processor.execute(&mut entries, &operation, &result);
            }
            (handler, entries.is_empty())
        };
        self.remove_persisted(operation.qid).await;

        tracing::debug!(qid = %operation.qid, "operation forwarded");
        self.notify(|l| l.on_operation_success(&operation, &result));
        if let Some(handler) = handler {
            let _ = handler.send(Ok(result));
        }
        if now_empty {
            self.notify(|l| l.on_queue_cleared());
        }
    }

    async fn fail(&self, operation: QueueEntryOperation<T>, error: ExecutionError) {
        self.mark(operation.qid, EntryState::FailedTerminal);
        let (handler, now_empty) = {
            let mut entries = self.entries.lock().unwrap();
            let handler = take_entry(&mut entries, operation.qid);
            (handler, entries.is_empty())
        };
        self.remove_persisted(operation.qid).await;

        tracing::warn!(qid = %operation.qid, error = %error, "operation failed terminally");
        self.notify(|l| l.on_operation_failure(&operation, &error));
        if let Some(handler) = handler {
            let _ = handler.send(Err(error));
        }
        if now_empty {
            self.notify(|l| l.on_queue_cleared());
        }
    }

    fn requeue(&self, operation: &QueueEntryOperation<T>, error: &ExecutionError) {
        self.mark(operation.qid, EntryState::Queued);
        tracing::warn!(
            qid = %operation.qid,
            error = %error,
            "network failure, operation stays queued for retry"
        );
        self.notify(|l| l.on_operation_requeued(operation));
    }

    fn mark(&self, qid: Uuid, state: EntryState) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.operation.qid == qid) {
            entry.state = state;
        }
    }

    async fn remove_persisted(&self, qid: Uuid) {
        if let Some(store) = &self.store {
            if let Err(error) = store.remove_entry(qid).await {
                tracing::warn!(qid = %qid, error = %error, "failed to remove persisted queue entry");
            }
        }
    }

    async fn is_online(&self) -> bool {
        match &self.network {
            Some(network) => !network.is_offline().await,
            None => false,
        }
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn OfflineQueueListener<T, R>),
    {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                tracing::warn!("queue listener panicked during notification");
            }
        }
    }
}

/// Remove the entry with the given id and hand back its result channel.
fn take_entry<T, R>(
    entries: &mut Vec<QueueEntry<T, R>>,
    qid: Uuid,
) -> Option<entry::ResultSender<R>> {
    let idx = entries.iter().position(|e| e.operation.qid == qid)?;
    let mut entry = entries.remove(idx);
    entry.handler.take()
}

#[cfg(test)]
mod tests {
    use super::serializer::JsonOperationSerializer;
    use super::*;
    use crate::network::ToggleNetworkStatus;
    use crate::storage::{InMemoryStore, PersistentStore, StoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Executor recording every call; failures are scripted per payload.
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: Mutex<Vec<String>>,
        failures: Mutex<HashMap<String, ExecutionError>>,
        delay: Option<Duration>,
    }

    impl ScriptedExecutor {
        fn fail_with(&self, op: &str, error: ExecutionError) {
            self.failures.lock().unwrap().insert(op.to_string(), error);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor<String, String> for ScriptedExecutor {
        async fn execute(&self, op: String) -> Result<String, ExecutionError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push(op.clone());
            if let Some(error) = self.failures.lock().unwrap().get(&op) {
                return Err(error.clone());
            }
            Ok(format!("done:{op}"))
        }
    }

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl EventLog {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl OfflineQueueListener<String, String> for EventLog {
        fn on_operation_enqueued(&self, operation: &QueueEntryOperation<String>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("enqueued:{}", operation.op));
        }

        fn on_operation_requeued(&self, operation: &QueueEntryOperation<String>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("requeued:{}", operation.op));
        }

        fn on_operation_success(&self, operation: &QueueEntryOperation<String>, _result: &String) {
            self.events
                .lock()
                .unwrap()
                .push(format!("success:{}", operation.op));
        }

        fn on_operation_failure(
            &self,
            operation: &QueueEntryOperation<String>,
            _error: &ExecutionError,
        ) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failure:{}", operation.op));
        }

        fn on_queue_cleared(&self) {
            self.events.lock().unwrap().push("cleared".to_string());
        }
    }

    fn offline_queue(
        executor: Arc<ScriptedExecutor>,
        store: Option<Arc<InMemoryStore>>,
    ) -> OfflineQueue<String, String> {
        let options = OfflineQueueOptions {
            store: store.map(|s| {
                OfflineStore::new(s as Arc<dyn PersistentStore>, Arc::new(JsonOperationSerializer))
            }),
            ..Default::default()
        };
        OfflineQueue::new(executor, options)
    }

    #[tokio::test]
    async fn test_forward_in_enqueue_order() {
        let executor = Arc::new(ScriptedExecutor::default());
        let queue = offline_queue(Arc::clone(&executor), None);

        let a = queue.enqueue("a".to_string()).await;
        let b = queue.enqueue("b".to_string()).await;
        let c = queue.enqueue("c".to_string()).await;

        queue.forward_operations().await;

        assert_eq!(executor.calls(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        assert_eq!(a.receiver.await.unwrap().unwrap(), "done:a");
        assert_eq!(b.receiver.await.unwrap().unwrap(), "done:b");
        assert_eq!(c.receiver.await.unwrap().unwrap(), "done:c");
    }

    #[tokio::test]
    async fn test_restore_preserves_enqueue_order() {
        let store = Arc::new(InMemoryStore::new());
        let executor = Arc::new(ScriptedExecutor::default());

        {
            let queue = offline_queue(Arc::clone(&executor), Some(Arc::clone(&store)));
            queue.enqueue("a".to_string()).await;
            queue.enqueue("b".to_string()).await;
            queue.enqueue("c".to_string()).await;
        }

        // A fresh process: new queue instance over the same storage.
        let log = Arc::new(EventLog::default());
        let restored = offline_queue(Arc::clone(&executor), Some(store));
        restored.register_listener(log.clone());
        restored.restore_offline_operations().await;

        let pending: Vec<String> = restored
            .pending_operations()
            .into_iter()
            .map(|op| op.op)
            .collect();
        assert_eq!(pending, vec!["a", "b", "c"]);
        assert_eq!(
            log.events(),
            vec!["requeued:a", "requeued:b", "requeued:c"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_forward_is_a_single_pass() {
        let executor = Arc::new(ScriptedExecutor {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let queue = offline_queue(Arc::clone(&executor), None);

        queue.enqueue("a".to_string()).await;
        queue.enqueue("b".to_string()).await;

        tokio::join!(queue.forward_operations(), queue.forward_operations());

        // Each entry forwarded exactly once; the second call was a no-op.
        assert_eq!(executor.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_network_failure_requeues_and_stops_pass() {
        let executor = Arc::new(ScriptedExecutor::default());
        executor.fail_with("a", ExecutionError::Network("connection refused".into()));
        let log = Arc::new(EventLog::default());
        let queue = offline_queue(Arc::clone(&executor), None);
        queue.register_listener(log.clone());

        let mut a = queue.enqueue("a".to_string()).await;
        queue.enqueue("b".to_string()).await;

        queue.forward_operations().await;

        // Only the failing head was attempted; both entries are still queued.
        assert_eq!(executor.calls(), vec!["a"]);
        assert_eq!(queue.len(), 2);
        // The caller's result is still pending.
        assert!(matches!(
            a.receiver.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
        assert!(log.events().contains(&"requeued:a".to_string()));

        // Once the failure clears, a later pass drains the queue in order.
        executor.failures.lock().unwrap().clear();
        queue.forward_operations().await;
        assert_eq!(executor.calls(), vec!["a", "a", "b"]);
        assert!(queue.is_empty());
        assert_eq!(a.receiver.await.unwrap().unwrap(), "done:a");
    }

    #[tokio::test]
    async fn test_application_failure_rejects_and_removes() {
        let executor = Arc::new(ScriptedExecutor::default());
        executor.fail_with("a", ExecutionError::Application("invalid input".into()));
        let log = Arc::new(EventLog::default());
        let queue = offline_queue(Arc::clone(&executor), None);
        queue.register_listener(log.clone());

        let a = queue.enqueue("a".to_string()).await;
        let b = queue.enqueue("b".to_string()).await;

        queue.forward_operations().await;

        // The rejected entry is gone, the rest of the pass continued.
        assert!(queue.is_empty());
        assert!(matches!(
            a.receiver.await.unwrap(),
            Err(ExecutionError::Application(_))
        ));
        assert_eq!(b.receiver.await.unwrap().unwrap(), "done:b");
        assert!(log.events().contains(&"failure:a".to_string()));
        assert!(log.events().contains(&"cleared".to_string()));
    }

    #[tokio::test]
    async fn test_dependent_entry_skipped_until_dependency_resolves() {
        let store = Arc::new(InMemoryStore::new());
        let offline_store = OfflineStore::new(
            Arc::clone(&store) as Arc<dyn PersistentStore>,
            Arc::new(JsonOperationSerializer),
        );

        // Persist an update that depends on a create stored behind it, as a
        // restart can leave the queue.
        let create_qid = Uuid::new_v4();
        let update = QueueEntryOperation {
            qid: Uuid::new_v4(),
            op: "update".to_string(),
            depends_on: Some(create_qid),
            enqueued_at: Utc::now(),
        };
        let create = QueueEntryOperation {
            qid: create_qid,
            op: "create".to_string(),
            depends_on: None,
            enqueued_at: Utc::now(),
        };
        offline_store.save_entry(&update).await.unwrap();
        offline_store.save_entry(&create).await.unwrap();

        let executor = Arc::new(ScriptedExecutor::default());
        let queue = offline_queue(Arc::clone(&executor), Some(store));
        queue.restore_offline_operations().await;
        queue.forward_operations().await;

        // The blocked update was skipped, then picked up after the create.
        assert_eq!(executor.calls(), vec!["create", "update"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_forwards_immediately_when_online() {
        let executor = Arc::new(ScriptedExecutor::default());
        let network = Arc::new(ToggleNetworkStatus::new(true));
        let options = OfflineQueueOptions {
            network: Some(network as Arc<dyn crate::network::NetworkStatus>),
            ..Default::default()
        };
        let queue = OfflineQueue::new(
            Arc::clone(&executor) as Arc<dyn Executor<String, String>>,
            options,
        );

        let a = queue.enqueue("a".to_string()).await;
        assert_eq!(executor.calls(), vec!["a"]);
        assert!(queue.is_empty());
        assert_eq!(a.receiver.await.unwrap().unwrap(), "done:a");
    }

    #[tokio::test]
    async fn test_listener_panic_does_not_block_transitions() {
        struct PanickingListener;
        impl OfflineQueueListener<String, String> for PanickingListener {
            fn on_operation_enqueued(&self, _operation: &QueueEntryOperation<String>) {
                panic!("listener bug");
            }
        }

        let executor = Arc::new(ScriptedExecutor::default());
        let log = Arc::new(EventLog::default());
        let queue = offline_queue(Arc::clone(&executor), None);
        queue.register_listener(Arc::new(PanickingListener));
        queue.register_listener(log.clone());

        let a = queue.enqueue("a".to_string()).await;
        assert_eq!(queue.len(), 1);
        // The listener after the panicking one was still notified.
        assert_eq!(log.events(), vec!["enqueued:a"]);

        queue.forward_operations().await;
        assert_eq!(a.receiver.await.unwrap().unwrap(), "done:a");
    }

    #[tokio::test]
    async fn test_persistence_failure_is_absorbed() {
        struct BrokenStore;

        #[async_trait]
        impl PersistentStore for BrokenStore {
            async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::InvalidKey(key.to_string()))
            }
            async fn set_item(&self, key: &str, _value: &str) -> Result<(), StoreError> {
                Err(StoreError::InvalidKey(key.to_string()))
            }
            async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
                Err(StoreError::InvalidKey(key.to_string()))
            }
            async fn keys(&self) -> Result<Vec<String>, StoreError> {
                Ok(Vec::new())
            }
            async fn clear(&self) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let executor = Arc::new(ScriptedExecutor::default());
        let options = OfflineQueueOptions {
            store: Some(OfflineStore::new(
                Arc::new(BrokenStore),
                Arc::new(JsonOperationSerializer),
            )),
            ..Default::default()
        };
        let queue = OfflineQueue::new(
            Arc::clone(&executor) as Arc<dyn Executor<String, String>>,
            options,
        );

        // The in-memory queue keeps working without durable storage.
        let a = queue.enqueue("a".to_string()).await;
        assert_eq!(queue.len(), 1);

        queue.forward_operations().await;
        assert_eq!(a.receiver.await.unwrap().unwrap(), "done:a");
    }
}
