//! TCP reachability probe.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::{NetworkInfo, NetworkStatus};

const CHANNEL_CAPACITY: usize = 16;
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Network status derived from probing a TCP endpoint.
///
/// Suitable for hosts without a platform connectivity API: a probe that
/// connects within the timeout means online, anything else means offline.
/// [`watch`](Self::watch) starts a background poller that broadcasts
/// transitions to subscribers.
pub struct TcpProbeNetworkStatus {
    addr: String,
    probe_timeout: Duration,
    state: Mutex<NetworkInfo>,
    tx: broadcast::Sender<NetworkInfo>,
}

impl TcpProbeNetworkStatus {
    /// Probe the given `host:port` endpoint. Starts out assumed offline
    /// until the first probe says otherwise.
    pub fn new(addr: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            addr: addr.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            state: Mutex::new(NetworkInfo::new(false)),
            tx,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Spawn a poller that probes at `interval` and broadcasts transitions.
    /// The task runs until aborted or the runtime shuts down.
    pub fn watch(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let this = self;
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                ticker.tick().await;
                let online = this.probe().await;
                this.record(online);
            }
        })
    }

    async fn probe(&self) -> bool {
        matches!(
            time::timeout(self.probe_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }

    /// Update the cached state, broadcasting only on a real transition.
    fn record(&self, online: bool) {
        let info = {
            let mut state = self.state.lock().unwrap();
            if state.online == online {
                return;
            }
            state.online = online;
            state.changed_at = Utc::now();
            state.clone()
        };
        tracing::info!(online, addr = %self.addr, "probed network status changed");
        let _ = self.tx.send(info);
    }
}

#[async_trait]
impl NetworkStatus for TcpProbeNetworkStatus {
    async fn is_offline(&self) -> bool {
        let online = self.probe().await;
        self.record(online);
        !online
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkInfo> {
        self.tx.subscribe()
    }
}
