//! Conflict resolution strategies.

use serde_json::{Map, Value};

/// Everything a strategy gets to work with when computing the resolved
/// object. The diffs are relative to `base`, with comparator state fields
/// already excluded.
pub struct ConflictContext<'a> {
    pub base: &'a Value,
    pub client: &'a Value,
    pub server: &'a Value,
    pub client_diff: &'a Map<String, Value>,
    pub server_diff: &'a Map<String, Value>,
    pub operation_name: &'a str,
}

/// Computes the resolved object for a detected conflict.
///
/// Must be a pure function of the context so that repeated resolutions of
/// the same inputs agree.
pub trait ConflictResolutionStrategy: Send + Sync {
    fn resolve(&self, context: &ConflictContext<'_>) -> Value;
}

/// Default strategy: overlay the client's changes onto the server state, so
/// the client wins on the fields it edited and the server everywhere else.
pub struct ClientWins;

impl ConflictResolutionStrategy for ClientWins {
    fn resolve(&self, context: &ConflictContext<'_>) -> Value {
        let mut resolved = context.server.clone();
        if let Some(object) = resolved.as_object_mut() {
            for (key, value) in context.client_diff {
                object.insert(key.clone(), value.clone());
            }
        }
        resolved
    }
}

/// Keep the server state, discarding the client's conflicting change.
pub struct ServerWins;

impl ConflictResolutionStrategy for ServerWins {
    fn resolve(&self, context: &ConflictContext<'_>) -> Value {
        context.server.clone()
    }
}
