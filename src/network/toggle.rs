//! Application-driven network status.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use super::{NetworkInfo, NetworkStatus};

const CHANNEL_CAPACITY: usize = 16;

/// Network status fed by the host application.
///
/// Platform integrations (browser events, native reachability callbacks, a
/// test harness) push transitions in through [`set_online`](Self::set_online);
/// duplicate reports of the current state are ignored, so subscribers see one
/// event per real transition.
pub struct ToggleNetworkStatus {
    state: Mutex<NetworkInfo>,
    tx: broadcast::Sender<NetworkInfo>,
}

impl ToggleNetworkStatus {
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(NetworkInfo::new(online)),
            tx,
        }
    }

    /// Report the current connectivity state. No-op when nothing changed.
    pub fn set_online(&self, online: bool) {
        let info = {
            let mut state = self.state.lock().unwrap();
            if state.online == online {
                return;
            }
            state.online = online;
            state.changed_at = Utc::now();
            state.clone()
        };
        tracing::debug!(online, "network status changed");
        let _ = self.tx.send(info);
    }

    /// Snapshot of the current state.
    pub fn info(&self) -> NetworkInfo {
        self.state.lock().unwrap().clone()
    }
}

impl Default for ToggleNetworkStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl NetworkStatus for ToggleNetworkStatus {
    async fn is_offline(&self) -> bool {
        !self.state.lock().unwrap().online
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkInfo> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_is_offline_reflects_state() {
        let status = ToggleNetworkStatus::new(false);
        assert!(status.is_offline().await);
        status.set_online(true);
        assert!(!status.is_offline().await);
    }

    #[tokio::test]
    async fn test_one_event_per_transition() {
        let status = ToggleNetworkStatus::new(false);
        let mut rx = status.subscribe();

        status.set_online(true);
        status.set_online(true);

        let info = rx.try_recv().unwrap();
        assert!(info.online);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_no_event_without_transition() {
        let status = ToggleNetworkStatus::new(true);
        let mut rx = status.subscribe();

        status.set_online(true);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
