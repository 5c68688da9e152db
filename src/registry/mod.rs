//! IS-04 registry that rebuilds its view from the configured nodes on every
//! query.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::config::RegistryConfig;
use crate::types::ResourceKind;

pub mod api;
pub mod peer;

pub use api::run_registry;
pub use peer::{HttpPeer, PeerError, PeerSource};

/// Merged view over every peer, built fresh for one request.
#[derive(Debug, Default, Serialize)]
pub struct AggregatedCatalog {
    pub nodes: Vec<Value>,
    pub devices: Vec<Value>,
    pub flows: Vec<Value>,
    pub senders: Vec<Value>,
    pub receivers: Vec<Value>,
}

impl AggregatedCatalog {
    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Nodes => self.nodes.len(),
            ResourceKind::Devices => self.devices.len(),
            ResourceKind::Flows => self.flows.len(),
            ResourceKind::Senders => self.senders.len(),
            ResourceKind::Receivers => self.receivers.len(),
        }
    }
}

pub struct Aggregator {
    peers: Vec<Arc<dyn PeerSource>>,
    timeout: Duration,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(peers: Vec<Arc<dyn PeerSource>>, timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            peers,
            timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Build HTTP peers for every configured node, sharing one client.
    pub fn from_config(config: &RegistryConfig, node_version: &str) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let peers = config
            .peers
            .iter()
            .map(|p| {
                HttpPeer::new(p, node_version, client.clone())
                    .map(|peer| Arc::new(peer) as Arc<dyn PeerSource>)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(peers, timeout, config.max_concurrency))
    }

    pub fn peer_names(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.name()).collect()
    }

    /// Poll every peer for `kind` and concatenate the answers in peer order.
    /// Peers that fail or time out contribute nothing.
    pub async fn query(&self, kind: ResourceKind) -> Vec<Value> {
        let deadline = self.timeout;
        let answers: Vec<Vec<Value>> = stream::iter(self.peers.clone())
            .map(move |peer| poll(peer, kind, deadline))
            .boxed()
            .buffered(self.max_concurrency)
            .collect()
            .await;
        let merged: Vec<Value> = answers.into_iter().flatten().collect();
        debug!(
            "Aggregated {} {} from {} peers",
            merged.len(),
            kind,
            self.peers.len()
        );
        merged
    }

    /// Full aggregation of `kind`, then the first entry whose `id` matches.
    pub async fn query_one(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.query(kind)
            .await
            .into_iter()
            .find(|object| object.get("id").and_then(Value::as_str) == Some(id))
    }

    pub async fn aggregate_all(&self) -> AggregatedCatalog {
        let (nodes, devices, flows, senders, receivers) = tokio::join!(
            self.query(ResourceKind::Nodes),
            self.query(ResourceKind::Devices),
            self.query(ResourceKind::Flows),
            self.query(ResourceKind::Senders),
            self.query(ResourceKind::Receivers),
        );
        AggregatedCatalog {
            nodes,
            devices,
            flows,
            senders,
            receivers,
        }
    }
}

async fn poll(peer: Arc<dyn PeerSource>, kind: ResourceKind, deadline: Duration) -> Vec<Value> {
    let result = match timeout(deadline, peer.fetch(kind)).await {
        Ok(result) => result,
        Err(_) => Err(PeerError::Timeout(deadline)),
    };
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!("Peer {} unavailable for {}: {}", peer.name(), kind, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Instant;

    /// In-memory peer: fixed answer, optional delay, or failure.
    pub(crate) struct FakePeer {
        name: String,
        items: Option<Vec<Value>>,
        delay: Duration,
    }

    impl FakePeer {
        pub(crate) fn serving(name: &str, ids: &[&str]) -> Arc<dyn PeerSource> {
            Arc::new(Self {
                name: name.into(),
                items: Some(ids.iter().map(|id| json!({ "id": id, "peer": name })).collect()),
                delay: Duration::ZERO,
            })
        }

        pub(crate) fn failing(name: &str) -> Arc<dyn PeerSource> {
            Arc::new(Self {
                name: name.into(),
                items: None,
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &str, ids: &[&str], delay: Duration) -> Arc<dyn PeerSource> {
            Arc::new(Self {
                name: name.into(),
                items: Some(ids.iter().map(|id| json!({ "id": id })).collect()),
                delay,
            })
        }
    }

    #[async_trait]
    impl PeerSource for FakePeer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _kind: ResourceKind) -> Result<Vec<Value>, PeerError> {
            tokio::time::sleep(self.delay).await;
            self.items.clone().ok_or(PeerError::Status(503))
        }
    }

    fn ids(items: &[Value]) -> Vec<&str> {
        items.iter().map(|v| v["id"].as_str().unwrap()).collect()
    }

    fn aggregator(peers: Vec<Arc<dyn PeerSource>>) -> Aggregator {
        Aggregator::new(peers, Duration::from_secs(2), 8)
    }

    #[tokio::test]
    async fn unreachable_peer_is_omitted_and_order_kept() {
        let agg = aggregator(vec![
            FakePeer::serving("one", &["a1", "a2"]),
            FakePeer::failing("two"),
            FakePeer::serving("three", &["c1"]),
        ]);
        let senders = agg.query(ResourceKind::Senders).await;
        assert_eq!(ids(&senders), ["a1", "a2", "c1"]);
    }

    #[tokio::test]
    async fn all_peers_down_yields_empty() {
        let agg = aggregator(vec![FakePeer::failing("one"), FakePeer::failing("two")]);
        assert!(agg.query(ResourceKind::Nodes).await.is_empty());
        assert!(aggregator(Vec::new()).query(ResourceKind::Flows).await.is_empty());
    }

    #[tokio::test]
    async fn slow_peer_is_cut_off_by_the_timeout() {
        let agg = Aggregator::new(
            vec![
                FakePeer::slow("slow", &["s1"], Duration::from_secs(5)),
                FakePeer::serving("fast", &["f1"]),
            ],
            Duration::from_millis(100),
            8,
        );
        let started = Instant::now();
        let devices = agg.query(ResourceKind::Devices).await;
        assert_eq!(ids(&devices), ["f1"]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn peers_are_polled_concurrently() {
        let delay = Duration::from_millis(300);
        let agg = aggregator(vec![
            FakePeer::slow("p1", &["1"], delay),
            FakePeer::slow("p2", &["2"], delay),
            FakePeer::slow("p3", &["3"], delay),
            FakePeer::slow("p4", &["4"], delay),
        ]);
        let started = Instant::now();
        let receivers = agg.query(ResourceKind::Receivers).await;
        assert_eq!(ids(&receivers), ["1", "2", "3", "4"]);
        assert!(started.elapsed() < delay * 3);
    }

    #[tokio::test]
    async fn lookup_by_id_searches_the_full_aggregation() {
        let agg = aggregator(vec![
            FakePeer::failing("one"),
            FakePeer::serving("two", &["x", "y"]),
        ]);
        let found = agg.query_one(ResourceKind::Flows, "y").await.unwrap();
        assert_eq!(found["peer"], "two");
        assert!(agg.query_one(ResourceKind::Flows, "zzz").await.is_none());
    }

    #[tokio::test]
    async fn aggregate_all_counts_every_kind() {
        let agg = aggregator(vec![FakePeer::serving("one", &["a", "b"])]);
        let all = agg.aggregate_all().await;
        for kind in ResourceKind::ALL {
            assert_eq!(all.count(kind), 2);
        }
    }
}
