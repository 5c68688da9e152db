//! IS-07 event and tally service with fixed seed data.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::{self, route_both, versions};

#[derive(Debug, Clone, Serialize)]
pub struct EventSource {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub source_id: String,
    pub flow_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timing {
    pub creation_timestamp: String,
}

/// An IS-07 state message.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub identity: Identity,
    pub event_type: String,
    pub timing: Timing,
    pub payload: Value,
    pub message_type: String,
}

pub struct EventTally {
    version: String,
    source: EventSource,
    events: Vec<EventMessage>,
}

impl EventTally {
    /// Seed one boolean tally source whose id derives from `node_id`.
    pub fn seeded(node_id: Uuid, version: &str) -> Self {
        let source_id = Uuid::new_v5(&node_id, b"events.source.tally").to_string();
        let tally = EventMessage {
            identity: Identity {
                source_id: source_id.clone(),
                flow_id: None,
            },
            event_type: "boolean".into(),
            timing: Timing {
                creation_timestamp: "1523456789:0".into(),
            },
            payload: json!({ "value": false }),
            message_type: "state".into(),
        };
        Self {
            version: version.to_string(),
            source: EventSource {
                id: source_id,
                description: "Mock IS-07 event source".into(),
            },
            events: vec![tally],
        }
    }
}

pub fn router(service: Arc<EventTally>) -> Router {
    let base = format!("/x-nmos/events/{}", service.version);
    let listed = service.version.clone();
    let discovery = get(move || {
        let version = listed.clone();
        async move { versions(&version) }
    });

    let mut router = route_both(Router::new(), "/x-nmos/events", discovery.clone());
    router = route_both(router, &base, discovery);
    router = route_both(router, &format!("{}/events", base), get(events));
    router = route_both(router, &format!("{}/state", base), get(state));
    router = route_both(router, &format!("{}/sources", base), get(sources));
    router
        .route("/health", get(health))
        .with_state(service)
}

pub async fn run_event_tally(addr: SocketAddr, service: Arc<EventTally>) -> anyhow::Result<()> {
    http::serve("IS-07 event & tally", addr, router(service)).await
}

async fn events(State(service): State<Arc<EventTally>>) -> Json<Vec<EventMessage>> {
    Json(service.events.clone())
}

async fn state(State(service): State<Arc<EventTally>>) -> Json<Value> {
    Json(json!({
        "source_id": service.source.id,
        "events": service.events,
    }))
}

async fn sources(State(service): State<Arc<EventTally>>) -> Json<Vec<EventSource>> {
    Json(vec![service.source.clone()])
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": http::timestamp() }))
}
