//! IS-08 audio channel mapping service: one 5.1 input routable to one
//! stereo output, with a mutable active map.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::connection::ActivationMode;
use crate::error::ApiResult;
use crate::http::{self, route_both, versions};

const INPUT_ID: &str = "input1";
const OUTPUT_ID: &str = "output1";

/// One output channel's source: a channel of some input, silence, or
/// nothing routed (`{"input": null, "channel_index": null}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MapEntry {
    Route {
        input: String,
        channel_index: usize,
    },
    Mute {
        mute: bool,
    },
    Unrouted {
        input: Option<String>,
        channel_index: Option<usize>,
    },
}

pub type ChannelMap = BTreeMap<String, Vec<MapEntry>>;

#[derive(Debug, Default, Deserialize)]
pub struct ActivationRequest {
    #[serde(default)]
    pub mode: ActivationMode,
    #[serde(default)]
    pub requested: Option<ChannelMap>,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub activation_id: String,
    pub mode: ActivationMode,
}

pub struct ChannelMapping {
    version: String,
    io: Value,
    active: RwLock<ChannelMap>,
}

impl ChannelMapping {
    pub fn seeded(node_id: Uuid, version: &str) -> Self {
        let labels = |names: &[&str]| -> Vec<Value> {
            names.iter().map(|l| json!({ "label": l })).collect()
        };
        let source_id = Uuid::new_v5(&node_id, b"channelmapping.output1");
        let io = json!({
            "inputs": {
                INPUT_ID: {
                    "parent": { "id": null, "type": null },
                    "channels": labels(&["L", "R", "C", "LFE", "LS", "RS"]),
                    "caps": { "reordering": true, "block_size": 1 },
                    "properties": {
                        "name": "Mock 5.1 Input",
                        "description": "Mock stereo/5.1 input",
                    },
                }
            },
            "outputs": {
                OUTPUT_ID: {
                    "source_id": source_id.to_string(),
                    "channels": labels(&["L", "R"]),
                    "caps": { "routable_inputs": [INPUT_ID] },
                    "properties": {
                        "name": "Mock Stereo Output",
                        "description": "Mock stereo output",
                    },
                }
            },
        });
        let route = |channel_index| MapEntry::Route {
            input: INPUT_ID.into(),
            channel_index,
        };
        let mut active = ChannelMap::new();
        active.insert(OUTPUT_ID.into(), vec![route(0), route(1)]);

        Self {
            version: version.to_string(),
            io,
            active: RwLock::new(active),
        }
    }

    fn ids(&self, section: &str) -> Vec<String> {
        self.io[section]
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn active(&self) -> ChannelMap {
        self.active.read().await.clone()
    }

    /// Replace the active map with `requested` when it names any output.
    pub async fn activate(&self, request: ActivationRequest) -> ActivationResponse {
        if let Some(requested) = request.requested.filter(|r| !r.is_empty()) {
            info!("Channel map activated for outputs {:?}", requested.keys().collect::<Vec<_>>());
            *self.active.write().await = requested;
        }
        ActivationResponse {
            activation_id: Uuid::new_v4().to_string(),
            mode: request.mode,
        }
    }
}

pub fn router(service: Arc<ChannelMapping>) -> Router {
    let base = format!("/x-nmos/channelmapping/{}", service.version);
    let listed = service.version.clone();
    let discovery = get(move || {
        let version = listed.clone();
        async move { versions(&version) }
    });

    let mut router = route_both(Router::new(), "/x-nmos/channelmapping", discovery.clone());
    router = route_both(router, &base, discovery);
    router = route_both(router, &format!("{}/inputs", base), get(inputs));
    router = route_both(router, &format!("{}/outputs", base), get(outputs));
    router = route_both(router, &format!("{}/io", base), get(io));
    router = route_both(router, &format!("{}/map/active", base), get(active));
    router = route_both(router, &format!("{}/map/activations", base), post(activate));
    router
        .route("/health", get(health))
        .with_state(service)
}

pub async fn run_channel_mapping(
    addr: SocketAddr,
    service: Arc<ChannelMapping>,
) -> anyhow::Result<()> {
    http::serve("IS-08 channel mapping", addr, router(service)).await
}

type Svc = State<Arc<ChannelMapping>>;

async fn inputs(State(service): Svc) -> Json<Vec<String>> {
    Json(service.ids("inputs"))
}

async fn outputs(State(service): Svc) -> Json<Vec<String>> {
    Json(service.ids("outputs"))
}

async fn io(State(service): Svc) -> Json<Value> {
    Json(service.io.clone())
}

async fn active(State(service): Svc) -> Json<ChannelMap> {
    Json(service.active().await)
}

async fn activate(
    State(service): Svc,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ActivationResponse>)> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ActivationRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((StatusCode::CREATED, Json(service.activate(request).await)))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": http::timestamp() }))
}
