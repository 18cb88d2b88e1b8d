//! Background peer discovery for the active room.

use std::{sync::Arc, time::Duration};

use ds::PubSub;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Time between membership sweeps.
    pub interval: Duration,
    /// Addresses dialled once before the first sweep.
    pub bootstrap_peers: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            bootstrap_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Stopped after connecting to this many peers.
    Connected(usize),
    Cancelled,
}

/// Start discovery for `topic`. The task runs until it connects to at least
/// one peer or `cancel` fires, whichever comes first.
pub fn spawn<P: PubSub>(
    pubsub: Arc<P>,
    topic: String,
    settings: DiscoverySettings,
    cancel: CancellationToken,
) -> JoinHandle<DiscoveryOutcome> {
    tokio::spawn(async move { discover(pubsub.as_ref(), &topic, &settings, &cancel).await })
}

pub async fn discover<P: PubSub>(
    pubsub: &P,
    topic: &str,
    settings: &DiscoverySettings,
    cancel: &CancellationToken,
) -> DiscoveryOutcome {
    let bootstrap = async {
        for addr in &settings.bootstrap_peers {
            if let Err(e) = pubsub.connect(addr).await {
                warn!("Bootstrap warning: {e}");
            }
        }
    };
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Discovery on {topic} cancelled while bootstrapping");
            return DiscoveryOutcome::Cancelled;
        }
        _ = bootstrap => {}
    }

    let mut ticker = tokio::time::interval(settings.interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Discovery on {topic} cancelled");
                return DiscoveryOutcome::Cancelled;
            }
            _ = ticker.tick() => {
                debug!("Searching for peers on {topic}");
                let mut connected = 0;
                for peer in pubsub.list_peers(topic).await {
                    if &peer == pubsub.local_peer_id() {
                        continue;
                    }
                    match pubsub.connect(peer.as_str()).await {
                        Ok(()) => {
                            info!("Connected to: {peer}");
                            connected += 1;
                        }
                        Err(e) => debug!("Failed connecting to {peer}, error: {e}"),
                    }
                }
                if connected > 0 {
                    info!("Peer discovery complete on {topic}");
                    return DiscoveryOutcome::Connected(connected);
                }
            }
        }
    }
}
