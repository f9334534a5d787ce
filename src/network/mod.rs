//! Network status monitoring.
//!
//! The scheduler only needs two things from the platform: a point-in-time
//! online/offline answer and a stream of transition events. [`NetworkStatus`]
//! captures that contract; implementations differ only in how they detect the
//! underlying signal.

mod probe;
mod toggle;

pub use probe::TcpProbeNetworkStatus;
pub use toggle::ToggleNetworkStatus;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// A single connectivity transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Whether the client is considered online after the transition.
    pub online: bool,
    /// When the transition was observed.
    pub changed_at: DateTime<Utc>,
}

impl NetworkInfo {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            changed_at: Utc::now(),
        }
    }
}

/// Connectivity source consumed by the scheduler.
///
/// Subscribers receive exactly one [`NetworkInfo`] per actual transition;
/// re-reporting the current state emits nothing. Dropping the receiver
/// unsubscribes.
#[async_trait]
pub trait NetworkStatus: Send + Sync {
    /// Point-in-time check. Must always resolve with a best-effort answer,
    /// even when the underlying platform signal is unavailable.
    async fn is_offline(&self) -> bool;

    /// Subscribe to connectivity transitions.
    fn subscribe(&self) -> broadcast::Receiver<NetworkInfo>;
}
