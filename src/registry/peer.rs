use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};

use crate::config::PeerConfig;
use crate::types::ResourceKind;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("unexpected payload: {0}")]
    Decode(String),
}

/// A node the registry can pull one resource collection from.
#[async_trait]
pub trait PeerSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the peer's `kind` collection, already rewritten to the
    /// peer's client-reachable address.
    async fn fetch(&self, kind: ResourceKind) -> Result<Vec<Value>, PeerError>;
}

/// A simulated node polled over its IS-04 Node API.
pub struct HttpPeer {
    name: String,
    url: String,
    external_base: String,
    node_version: String,
    client: Client,
}

impl HttpPeer {
    pub fn new(config: &PeerConfig, node_version: &str, client: Client) -> anyhow::Result<Self> {
        Url::parse(&config.external_url).map_err(|e| {
            anyhow::anyhow!("Invalid external_url for peer {}: {}", config.name, e)
        })?;
        Ok(Self {
            name: config.name.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            external_base: config.external_url.trim_end_matches('/').to_string(),
            node_version: node_version.to_string(),
            client,
        })
    }

    fn rewrite(&self, kind: ResourceKind, mut object: Value) -> Value {
        rebase_hrefs(&mut object, &self.external_base);
        if let Value::Object(map) = &mut object {
            map.insert("base_url".into(), Value::String(self.external_base.clone()));
            if kind == ResourceKind::Nodes {
                let href = format!("{}/x-nmos/node/{}", self.external_base, self.node_version);
                map.insert("href".into(), Value::String(href));
            }
        }
        object
    }
}

#[async_trait]
impl PeerSource for HttpPeer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, kind: ResourceKind) -> Result<Vec<Value>, PeerError> {
        let url = format!(
            "{}/x-nmos/node/{}/{}",
            self.url,
            self.node_version,
            kind.node_api_path()
        );
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(PeerError::Status(resp.status().as_u16()));
        }
        let body = resp.bytes().await?;
        let body: Value =
            serde_json::from_slice(&body).map_err(|e| PeerError::Decode(e.to_string()))?;

        let objects = match (kind, body) {
            (ResourceKind::Nodes, node @ Value::Object(_)) => vec![node],
            (_, Value::Array(items)) => items,
            (kind, _) => {
                return Err(PeerError::Decode(format!(
                    "{} is not a {} document",
                    url,
                    if kind == ResourceKind::Nodes { "node" } else { "list" }
                )))
            }
        };
        Ok(objects
            .into_iter()
            .map(|object| self.rewrite(kind, object))
            .collect())
    }
}

fn is_href_key(key: &str) -> bool {
    key == "href" || key.ends_with("_href")
}

/// Move every absolute `href`/`*_href` URL in `value` under `external_base`
/// (no trailing slash), keeping path and query. A path prefix on the base
/// is kept in front of the original path.
pub fn rebase_hrefs(value: &mut Value, external_base: &str) {
    match value {
        Value::Object(map) => rebase_object(map, external_base),
        Value::Array(items) => items
            .iter_mut()
            .for_each(|v| rebase_hrefs(v, external_base)),
        _ => {}
    }
}

fn rebase_object(map: &mut Map<String, Value>, external_base: &str) {
    for (key, field) in map.iter_mut() {
        match field {
            Value::String(href) if is_href_key(key) => {
                if let Ok(parsed) = Url::parse(href) {
                    if parsed.has_host() {
                        let query = parsed.query().map(|q| format!("?{}", q)).unwrap_or_default();
                        *href = format!("{}{}{}", external_base, parsed.path(), query);
                    }
                }
            }
            other => rebase_hrefs(other, external_base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::spawn_device;
    use crate::http::testing;
    use crate::types::DeviceProfile;
    use serde_json::json;

    fn peer(url: &str, external: &str) -> HttpPeer {
        let config = PeerConfig {
            name: "peer".into(),
            url: url.into(),
            external_url: external.into(),
        };
        HttpPeer::new(&config, "v1.3", Client::new()).unwrap()
    }

    #[test]
    fn hrefs_move_to_the_external_origin() {
        let mut device = json!({
            "id": "d1",
            "controls": [{
                "href": "http://10.0.0.5:8080/x-nmos/connection/v1.0/",
                "type": "urn:x-nmos:control:sr-ctrl/v1.0"
            }],
            "manifest_href": "http://mock-node-1:8080/sdp/video1.sdp?x=1",
            "label_href": "not a url",
            "href_count": 3,
        });
        rebase_hrefs(&mut device, "http://studio.example:9000");
        assert_eq!(
            device["controls"][0]["href"],
            "http://studio.example:9000/x-nmos/connection/v1.0/"
        );
        assert_eq!(device["manifest_href"], "http://studio.example:9000/sdp/video1.sdp?x=1");
        assert_eq!(device["label_href"], "not a url");
        assert_eq!(device["href_count"], 3);
    }

    #[test]
    fn external_path_prefix_is_kept() {
        let mut sender = json!({"manifest_href": "http://10.0.0.5:8080/sdp/video1.sdp"});
        rebase_hrefs(&mut sender, "http://gw.example/studio1");
        assert_eq!(sender["manifest_href"], "http://gw.example/studio1/sdp/video1.sdp");
    }

    #[tokio::test]
    async fn fetched_resources_keep_the_gateway_prefix() {
        let (base, _ctx) = spawn_device(DeviceProfile::Encoder).await;
        let peer = peer(&base, "http://gw.example/studio1/");
        let senders = peer.fetch(ResourceKind::Senders).await.unwrap();
        assert_eq!(senders[0]["base_url"], "http://gw.example/studio1");
        assert_eq!(
            senders[0]["manifest_href"],
            "http://gw.example/studio1/sdp/video1.sdp"
        );
        let devices = peer.fetch(ResourceKind::Devices).await.unwrap();
        assert_eq!(
            devices[0]["controls"]["href"],
            "http://gw.example/studio1/x-nmos/connection/v1.0/"
        );
    }

    #[test]
    fn invalid_external_url_is_a_startup_error() {
        let config = PeerConfig {
            name: "bad".into(),
            url: "http://localhost:1".into(),
            external_url: "not a url".into(),
        };
        assert!(HttpPeer::new(&config, "v1.3", Client::new()).is_err());
    }

    #[tokio::test]
    async fn fetches_and_rewrites_senders() {
        let (base, ctx) = spawn_device(DeviceProfile::Encoder).await;
        let peer = peer(&base, "http://studio.example:9000/");
        let senders = peer.fetch(ResourceKind::Senders).await.unwrap();
        assert_eq!(senders.len(), ctx.catalog.senders.len());
        assert_eq!(senders[0]["id"], ctx.catalog.senders[0].id.as_str());
        assert_eq!(senders[0]["base_url"], "http://studio.example:9000");
        assert_eq!(
            senders[0]["manifest_href"],
            "http://studio.example:9000/sdp/video1.sdp"
        );
    }

    #[tokio::test]
    async fn node_self_becomes_a_single_entry_with_href() {
        let (base, ctx) = spawn_device(DeviceProfile::Decoder).await;
        let peer = peer(&base, "http://localhost:8081");
        let nodes = peer.fetch(ResourceKind::Nodes).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["id"], ctx.identity.node_id.to_string());
        assert_eq!(nodes[0]["href"], "http://localhost:8081/x-nmos/node/v1.3");
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let peer_down = peer(&testing::dead_url().await, "http://localhost:1");
        assert!(matches!(
            peer_down.fetch(ResourceKind::Flows).await,
            Err(PeerError::Transport(_))
        ));

        let not_a_node = testing::spawn(axum::Router::new()).await;
        let peer_404 = peer(&not_a_node, "http://localhost:1");
        assert!(matches!(
            peer_404.fetch(ResourceKind::Flows).await,
            Err(PeerError::Status(404))
        ));
    }
}
