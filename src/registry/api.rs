//! IS-04 Query API served from a fresh aggregation per request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde_json::{json, Map, Value};

use super::Aggregator;
use crate::error::{ApiError, ApiResult};
use crate::http::{self, route_both, versions};
use crate::types::ResourceKind;

type Agg = State<Arc<Aggregator>>;

fn parse_kind(kind: &str) -> ApiResult<ResourceKind> {
    kind.parse::<ResourceKind>()
        .map_err(|e| ApiError::not_found(e.to_string()))
}

pub fn router(aggregator: Arc<Aggregator>, version: &str) -> Router {
    let base = format!("/x-nmos/query/{}", version);
    let listed = version.to_string();
    let discovery = get(move || {
        let version = listed.clone();
        async move { versions(&version) }
    });

    let mut router = route_both(Router::new(), "/x-nmos/query", discovery.clone());
    router = route_both(router, &base, discovery);
    router = route_both(router, &format!("{}/:kind", base), get(list));
    router = route_both(router, &format!("{}/:kind/:id", base), get(single));
    router
        .route("/health", get(health))
        .with_state(aggregator)
}

pub async fn run_registry(
    addr: SocketAddr,
    aggregator: Arc<Aggregator>,
    version: &str,
) -> anyhow::Result<()> {
    info!(
        "Registry aggregating {} peers: {:?}",
        aggregator.peer_names().len(),
        aggregator.peer_names()
    );
    http::serve("IS-04 registry", addr, router(aggregator, version)).await
}

async fn list(State(aggregator): Agg, Path(kind): Path<String>) -> ApiResult<Json<Vec<Value>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(aggregator.query(kind).await))
}

async fn single(
    State(aggregator): Agg,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    aggregator
        .query_one(kind, &id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} not found: {}", kind, id)))
}

async fn health(State(aggregator): Agg) -> Json<Value> {
    let catalog = aggregator.aggregate_all().await;
    let counts: Map<String, Value> = ResourceKind::ALL
        .into_iter()
        .map(|kind| (kind.to_string(), json!(catalog.count(kind))))
        .collect();
    Json(json!({
        "status": "healthy",
        "timestamp": http::timestamp(),
        "resources": counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{profiles, test_identity};
    use crate::config::PeerConfig;
    use crate::device::{self, DeviceContext};
    use crate::http::testing;
    use crate::registry::tests::FakePeer;
    use crate::registry::{HttpPeer, PeerSource};
    use crate::types::DeviceProfile;
    use reqwest::StatusCode;
    use std::time::Duration;
    use uuid::Uuid;

    async fn spawn_node(profile: DeviceProfile) -> (String, Arc<DeviceContext>) {
        let mut identity = test_identity(8080);
        identity.node_id = Uuid::new_v4();
        let catalog = profiles::build(profile, identity.clone()).unwrap();
        let ctx = Arc::new(DeviceContext::new(identity, catalog));
        let base = testing::spawn(device::router(Arc::clone(&ctx))).await;
        (base, ctx)
    }

    fn http_peer(name: &str, url: &str) -> Arc<dyn PeerSource> {
        let config = PeerConfig {
            name: name.into(),
            url: url.into(),
            external_url: format!("http://{}.example", name),
        };
        Arc::new(HttpPeer::new(&config, "v1.3", reqwest::Client::new()).unwrap())
    }

    async fn get_json(url: String) -> (StatusCode, Value) {
        let resp = reqwest::get(url).await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn merges_live_nodes_and_skips_the_dead_one() {
        let (encoder_url, encoder) = spawn_node(DeviceProfile::Encoder).await;
        let (decoder_url, decoder) = spawn_node(DeviceProfile::Decoder).await;
        let dead = testing::dead_url().await;
        let aggregator = Arc::new(Aggregator::new(
            vec![
                http_peer("enc", &encoder_url),
                http_peer("gone", &dead),
                http_peer("dec", &decoder_url),
            ],
            Duration::from_secs(2),
            8,
        ));
        let base = testing::spawn(router(aggregator, "v1.3")).await;

        let (status, receivers) = get_json(format!("{}/x-nmos/query/v1.3/receivers/", base)).await;
        assert_eq!(status, StatusCode::OK);
        let receivers = receivers.as_array().unwrap();
        assert_eq!(receivers.len(), 4);
        assert_eq!(receivers[0]["id"], encoder.catalog.receivers[0].id.as_str());
        assert_eq!(receivers[0]["base_url"], "http://enc.example");
        assert_eq!(receivers[3]["id"], decoder.catalog.receivers[2].id.as_str());
        assert_eq!(receivers[3]["base_url"], "http://dec.example");

        let (_, nodes) = get_json(format!("{}/x-nmos/query/v1.3/nodes", base)).await;
        assert_eq!(nodes[1]["href"], "http://dec.example/x-nmos/node/v1.3");

        let node_id = decoder.identity.node_id.to_string();
        let node_url = format!("{}/x-nmos/query/v1.3/nodes/{}", base, node_id);
        let (status, node) = get_json(node_url).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node["id"], node_id);

        let (_, health) = get_json(format!("{}/health", base)).await;
        assert_eq!(health["resources"]["nodes"], 2);
        assert_eq!(health["resources"]["senders"], 2);
        assert_eq!(health["resources"]["receivers"], 4);
    }

    #[tokio::test]
    async fn unknown_id_and_kind_are_not_found() {
        let aggregator = Arc::new(Aggregator::new(
            vec![FakePeer::serving("one", &["a"])],
            Duration::from_secs(2),
            8,
        ));
        let base = testing::spawn(router(aggregator, "v1.3")).await;

        let (status, body) = get_json(format!("{}/x-nmos/query/v1.3/senders/nope", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "senders not found: nope");

        let (status, _) = get_json(format!("{}/x-nmos/query/v1.3/sources", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn every_peer_down_is_an_empty_list() {
        let aggregator = Arc::new(Aggregator::new(
            vec![FakePeer::failing("one"), FakePeer::failing("two")],
            Duration::from_secs(2),
            8,
        ));
        let base = testing::spawn(router(aggregator, "v1.3")).await;
        let (status, flows) = get_json(format!("{}/x-nmos/query/v1.3/flows", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(flows, json!([]));

        let (_, versions) = get_json(format!("{}/x-nmos/query/", base)).await;
        assert_eq!(versions, json!(["v1.3"]));
    }
}
