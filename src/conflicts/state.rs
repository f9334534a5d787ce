//! Object state comparators.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Field carrying the monotonic entity version for the versioned comparator.
pub const VERSION_FIELD: &str = "version";

/// Errors from conflict detection.
///
/// These are configuration and input-shape problems, reported eagerly; an
/// actual conflict is an outcome, not an error.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("object is missing the `version` field required for conflict detection: {0}")]
    MissingVersion(String),

    #[error("`version` field must be an integer: {0}")]
    InvalidVersion(String),

    #[error("conflict detection requires JSON objects, got: {0}")]
    NotAnObject(String),
}

/// Raw unresolved conflict payload, for callers that signal conflicts over
/// the wire instead of resolving locally.
#[derive(Debug, Clone, Error)]
#[error("object state conflict between client and server")]
pub struct ObjectConflictError {
    pub server_state: Value,
    pub client_state: Value,
}

/// How the versioned comparator treats entities without a `version` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingVersionPolicy {
    /// Fail fast; a missing version is a configuration error.
    #[default]
    Reject,
    /// Treat a missing version as version 1.
    InitializeToOne,
}

/// Hash function applied to the compared field subset.
pub type HashFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Default subset hash: SHA-256 over the serialized object.
pub fn json_sha256(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Pluggable logic deciding whether two entity snapshots conflict and how to
/// advance to the next agreed state.
#[derive(Clone)]
pub enum ObjectStateComparator {
    /// Entities carry a monotonic integer version; the server has moved on
    /// when its version differs from the one the client started from.
    Versioned { missing_version: MissingVersionPolicy },
    /// Entities are compared by hashing the client-touched field subset;
    /// fields the server changed that the client never touched do not
    /// conflict.
    HashBased { hash: HashFn },
}

impl ObjectStateComparator {
    pub fn versioned() -> Self {
        Self::Versioned {
            missing_version: MissingVersionPolicy::default(),
        }
    }

    pub fn versioned_with_policy(missing_version: MissingVersionPolicy) -> Self {
        Self::Versioned { missing_version }
    }

    pub fn hash_based(hash: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self::HashBased {
            hash: Arc::new(hash),
        }
    }

    pub fn hash_based_default() -> Self {
        Self::hash_based(json_sha256)
    }

    /// Pairwise check between the server's state and an incoming client
    /// change, returning the raw conflict payload when they diverge.
    pub fn check_for_conflict(
        &self,
        server: &Value,
        client: &Value,
    ) -> Result<Option<ObjectConflictError>, StateError> {
        let conflicted = match self {
            Self::Versioned { missing_version } => {
                read_version(server, *missing_version)? != read_version(client, *missing_version)?
            }
            Self::HashBased { hash } => {
                let keys: Vec<String> = as_object(client)?.keys().cloned().collect();
                hash(&subset(server, &keys)?) != hash(client)
            }
        };
        if conflicted {
            Ok(Some(ObjectConflictError {
                server_state: server.clone(),
                client_state: client.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Compute the next agreed state for an object that passed the check.
    /// Versioned objects advance their version; hashed objects are returned
    /// unchanged since the hash is computed on demand.
    pub fn next_state(&self, current: &Value) -> Result<Value, StateError> {
        match self {
            Self::Versioned { missing_version } => {
                let version = read_version(current, *missing_version)?;
                let mut next = current.clone();
                as_object_mut(&mut next)?
                    .insert(VERSION_FIELD.to_string(), Value::from(version + 1));
                Ok(next)
            }
            Self::HashBased { .. } => Ok(current.clone()),
        }
    }

    /// Three-way divergence check: did the server move away from `base` in
    /// fields the client also touched? For the hash comparator the compared
    /// subset is restricted to the client's changed fields, so server edits
    /// the client never touched do not conflict.
    pub(crate) fn detect(
        &self,
        base: &Value,
        client: &Value,
        server: &Value,
    ) -> Result<bool, StateError> {
        match self {
            Self::Versioned { missing_version } => Ok(read_version(server, *missing_version)?
                != read_version(base, *missing_version)?),
            Self::HashBased { hash } => {
                let touched = changed_keys(base, client)?;
                Ok(hash(&subset(server, &touched)?) != hash(&subset(base, &touched)?))
            }
        }
    }

    /// Fields that belong to the comparator, excluded from diffing.
    pub(crate) fn state_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Versioned { .. } => &[VERSION_FIELD, "id"],
            Self::HashBased { .. } => &[],
        }
    }

    /// Stamp the resolved object with the next state derived from the
    /// server's current one.
    pub(crate) fn advance(&self, resolved: Value, server: &Value) -> Result<Value, StateError> {
        match self {
            Self::Versioned { missing_version } => {
                let server_version = read_version(server, *missing_version)?;
                let mut next = resolved;
                as_object_mut(&mut next)?
                    .insert(VERSION_FIELD.to_string(), Value::from(server_version + 1));
                Ok(next)
            }
            Self::HashBased { .. } => Ok(resolved),
        }
    }
}

impl fmt::Debug for ObjectStateComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned { missing_version } => f
                .debug_struct("Versioned")
                .field("missing_version", missing_version)
                .finish(),
            Self::HashBased { .. } => f.debug_struct("HashBased").finish_non_exhaustive(),
        }
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, StateError> {
    value
        .as_object()
        .ok_or_else(|| StateError::NotAnObject(value.to_string()))
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, StateError> {
    if !value.is_object() {
        return Err(StateError::NotAnObject(value.to_string()));
    }
    Ok(value.as_object_mut().unwrap())
}

fn read_version(value: &Value, policy: MissingVersionPolicy) -> Result<i64, StateError> {
    match as_object(value)?.get(VERSION_FIELD) {
        Some(version) => version
            .as_i64()
            .ok_or_else(|| StateError::InvalidVersion(value.to_string())),
        None => match policy {
            MissingVersionPolicy::Reject => Err(StateError::MissingVersion(value.to_string())),
            MissingVersionPolicy::InitializeToOne => Ok(1),
        },
    }
}

/// Project an object onto the given keys; missing keys are omitted.
fn subset(value: &Value, keys: &[String]) -> Result<Value, StateError> {
    let object = as_object(value)?;
    let mut filtered = Map::new();
    for key in keys {
        if let Some(v) = object.get(key) {
            filtered.insert(key.clone(), v.clone());
        }
    }
    Ok(Value::Object(filtered))
}

/// Keys whose value in `other` differs from `base`.
fn changed_keys(base: &Value, other: &Value) -> Result<Vec<String>, StateError> {
    let base = as_object(base)?;
    let other = as_object(other)?;
    Ok(other
        .iter()
        .filter(|(key, value)| base.get(*key) != Some(value))
        .map(|(key, _)| key.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_versioned_equal_versions_pass_and_advance() {
        let comparator = ObjectStateComparator::versioned();
        let server = json!({ "name": "AeroGear", "version": 1 });
        let client = json!({ "name": "Red Hat", "version": 1 });

        assert!(comparator
            .check_for_conflict(&server, &client)
            .unwrap()
            .is_none());

        let next = comparator.next_state(&client).unwrap();
        assert_eq!(next["version"], json!(2));
    }

    #[test]
    fn test_versioned_detects_stale_client() {
        let comparator = ObjectStateComparator::versioned();
        let server = json!({ "name": "AeroGear", "version": 2 });
        let client = json!({ "name": "Red Hat", "version": 1 });

        let conflict = comparator
            .check_for_conflict(&server, &client)
            .unwrap()
            .expect("conflict expected");
        assert_eq!(conflict.server_state, server);
        assert_eq!(conflict.client_state, client);
    }

    #[test]
    fn test_versioned_missing_version_fails_fast() {
        let comparator = ObjectStateComparator::versioned();
        let server = json!({ "name": "AeroGear" });
        let client = json!({ "name": "AeroGear", "version": 1 });

        assert!(matches!(
            comparator.check_for_conflict(&server, &client),
            Err(StateError::MissingVersion(_))
        ));
    }

    #[test]
    fn test_versioned_missing_version_initialize_policy() {
        let comparator =
            ObjectStateComparator::versioned_with_policy(MissingVersionPolicy::InitializeToOne);
        let server = json!({ "name": "AeroGear" });
        let client = json!({ "name": "AeroGear", "version": 1 });

        assert!(comparator
            .check_for_conflict(&server, &client)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_hash_detects_divergent_client_subset() {
        let comparator = ObjectStateComparator::hash_based(|value| value.to_string());
        let server = json!({ "name": "AeroGear", "extra": "x", "version": 1 });
        let client = json!({ "name": "Red Hat", "version": 1 });

        assert!(comparator
            .check_for_conflict(&server, &client)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_hash_ignores_fields_client_never_touched() {
        let comparator = ObjectStateComparator::hash_based_default();
        let server = json!({ "name": "AeroGear", "extra": "server only", "version": 1 });
        let client = json!({ "name": "AeroGear", "version": 1 });

        assert!(comparator
            .check_for_conflict(&server, &client)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_non_object_input_is_rejected() {
        let comparator = ObjectStateComparator::hash_based_default();
        assert!(matches!(
            comparator.check_for_conflict(&json!([1, 2]), &json!({ "a": 1 })),
            Err(StateError::NotAnObject(_))
        ));
    }
}
