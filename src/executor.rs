//! Executor seam between the queue and whatever performs the actual work.
//!
//! The scheduler never inspects operation payloads or results; it hands the
//! payload to an [`Executor`] and classifies the outcome. Implementations
//! typically wrap an HTTP client, a GraphQL transport or a message sender.

use async_trait::async_trait;
use thiserror::Error;

/// Errors an executor can report back to the queue.
///
/// The variant decides the queue's retry policy: network-class failures keep
/// the entry queued for a later attempt, application-level failures are
/// terminal and reject the caller.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The transport could not reach the other side.
    #[error("network unreachable: {0}")]
    Network(String),
    /// The operation itself was rejected; retrying would not change the outcome.
    #[error("operation rejected: {0}")]
    Application(String),
}

impl ExecutionError {
    /// True for failures that are expected to clear once connectivity returns.
    pub fn is_network(&self) -> bool {
        matches!(self, ExecutionError::Network(_))
    }
}

/// Performs a single queued operation.
///
/// `T` is the opaque operation payload, `R` the result handed back to the
/// original caller.
#[async_trait]
pub trait Executor<T, R>: Send + Sync {
    async fn execute(&self, op: T) -> Result<R, ExecutionError>;
}
