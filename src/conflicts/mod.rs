//! Optimistic conflict detection and resolution.
//!
//! Reconciliation works on three versions of the same logical entity: the
//! `base` both sides last agreed on, the `client` change made locally, and
//! the authoritative `server` state at merge time. A pluggable
//! [`ObjectStateComparator`] decides whether the server diverged in fields
//! the client also touched; a [`ConflictResolutionStrategy`] computes the
//! resolved object when it did.

mod engine;
mod listener;
mod state;
mod strategy;

pub use engine::{ConflictEngine, ConflictResolutionResult, ObjectStateSnapshot};
pub use listener::ConflictListener;
pub use state::{
    json_sha256, HashFn, MissingVersionPolicy, ObjectConflictError, ObjectStateComparator,
    StateError, VERSION_FIELD,
};
pub use strategy::{ClientWins, ConflictContext, ConflictResolutionStrategy, ServerWins};
