//! Conflict notifications.

use serde_json::Value;

/// Observer of reconciliation outcomes.
///
/// `conflict_occurred` fires when concurrent divergent edits were resolved
/// by a strategy; `merge_occurred` fires on a clean merge of non-overlapping
/// changes and is optional to implement. Typical implementations surface the
/// conflict to the user or log it for audit.
#[allow(unused_variables)]
pub trait ConflictListener: Send + Sync {
    fn conflict_occurred(
        &self,
        operation_name: &str,
        resolved: &Value,
        server: &Value,
        client: &Value,
    );

    fn merge_occurred(
        &self,
        operation_name: &str,
        resolved: &Value,
        server: &Value,
        client: &Value,
    ) {
    }
}
