//! Three-way reconciliation engine.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::listener::ConflictListener;
use super::state::{ObjectStateComparator, StateError};
use super::strategy::{ClientWins, ConflictContext, ConflictResolutionStrategy};

/// The three versions of an entity involved in a resolution:
/// the last agreed state, the local pending change, and the authoritative
/// remote state at merge time.
#[derive(Debug, Clone)]
pub struct ObjectStateSnapshot {
    pub base: Value,
    pub client: Value,
    pub server: Value,
}

impl ObjectStateSnapshot {
    pub fn new(base: Value, client: Value, server: Value) -> Self {
        Self {
            base,
            client,
            server,
        }
    }
}

/// Outcome of a resolution: the merged entity plus whether a true conflict
/// (concurrent divergent edits) occurred, as opposed to a clean merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolutionResult {
    pub resolved: Value,
    pub conflicted: bool,
}

/// Detects conflicts between a client change and the server state, and
/// computes the resolved entity.
///
/// Resolution is a pure function of the snapshot, the comparator and the
/// strategy: repeated calls with identical inputs return identical results.
/// Listeners observe outcomes but never influence them.
pub struct ConflictEngine {
    comparator: ObjectStateComparator,
    strategy: Arc<dyn ConflictResolutionStrategy>,
    listeners: Vec<Arc<dyn ConflictListener>>,
}

impl ConflictEngine {
    /// Engine with the default client-wins strategy and no listeners.
    pub fn new(comparator: ObjectStateComparator) -> Self {
        Self {
            comparator,
            strategy: Arc::new(ClientWins),
            listeners: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ConflictResolutionStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ConflictListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn comparator(&self) -> &ObjectStateComparator {
        &self.comparator
    }

    /// Reconcile the snapshot and return the resolved entity.
    ///
    /// Without a conflict the result is a straight merge: server state
    /// overlaid with the fields the client changed. With a conflict the
    /// configured strategy decides. Either way the comparator stamps the
    /// next agreed state (e.g. the advanced version) onto the result, and
    /// `base`/`server` are left untouched.
    pub fn resolve(
        &self,
        snapshot: &ObjectStateSnapshot,
        operation_name: &str,
    ) -> Result<ConflictResolutionResult, StateError> {
        let ignored = self.comparator.state_fields();
        let client_diff = diff(&snapshot.base, &snapshot.client, ignored)?;
        let server_diff = diff(&snapshot.base, &snapshot.server, ignored)?;
        let conflicted = self
            .comparator
            .detect(&snapshot.base, &snapshot.client, &snapshot.server)?;

        let resolved = if conflicted {
            let context = ConflictContext {
                base: &snapshot.base,
                client: &snapshot.client,
                server: &snapshot.server,
                client_diff: &client_diff,
                server_diff: &server_diff,
                operation_name,
            };
            self.strategy.resolve(&context)
        } else {
            overlay(&snapshot.server, &client_diff)
        };
        let resolved = self.comparator.advance(resolved, &snapshot.server)?;

        if conflicted {
            tracing::info!(operation = operation_name, "conflicting edits resolved");
            for listener in &self.listeners {
                listener.conflict_occurred(
                    operation_name,
                    &resolved,
                    &snapshot.server,
                    &snapshot.client,
                );
            }
        } else {
            tracing::debug!(operation = operation_name, "non-overlapping changes merged");
            for listener in &self.listeners {
                listener.merge_occurred(
                    operation_name,
                    &resolved,
                    &snapshot.server,
                    &snapshot.client,
                );
            }
        }

        Ok(ConflictResolutionResult {
            resolved,
            conflicted,
        })
    }
}

/// Fields of `other` that differ from `base`, minus comparator state fields.
fn diff(
    base: &Value,
    other: &Value,
    ignored: &[&str],
) -> Result<Map<String, Value>, StateError> {
    let base = base
        .as_object()
        .ok_or_else(|| StateError::NotAnObject(base.to_string()))?;
    let other = other
        .as_object()
        .ok_or_else(|| StateError::NotAnObject(other.to_string()))?;

    let mut changed = Map::new();
    for (key, value) in other {
        if ignored.contains(&key.as_str()) {
            continue;
        }
        if base.get(key) != Some(value) {
            changed.insert(key.clone(), value.clone());
        }
    }
    Ok(changed)
}

/// Server state with the given fields overlaid.
fn overlay(server: &Value, fields: &Map<String, Value>) -> Value {
    let mut resolved = server.clone();
    if let Some(object) = resolved.as_object_mut() {
        for (key, value) in fields {
            object.insert(key.clone(), value.clone());
        }
    }
    resolved
}
