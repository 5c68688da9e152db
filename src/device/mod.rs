//! A simulated NMOS node: IS-04 Node API, IS-05 Connection API and the
//! transport files its senders advertise.
//!
//! Each device instance owns its catalog and connection store through a
//! [`DeviceContext`] shared by its handlers; nothing is process-global.

mod connection_api;
mod node_api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde_json::json;

use crate::catalog::{Catalog, NodeIdentity};
use crate::connection::ConnectionStore;
use crate::error::{ApiError, ApiResult};
use crate::http;
use crate::sdp::SDP_CONTENT_TYPE;

pub struct DeviceContext {
    pub identity: NodeIdentity,
    pub catalog: Catalog,
    pub connections: ConnectionStore,
}

impl DeviceContext {
    pub fn new(identity: NodeIdentity, catalog: Catalog) -> Self {
        let connections = ConnectionStore::new(catalog.sender_ids(), catalog.receiver_ids());
        Self {
            identity,
            catalog,
            connections,
        }
    }
}

pub fn router(ctx: Arc<DeviceContext>) -> Router {
    Router::new()
        .merge(node_api::routes(&ctx.identity.node_version))
        .merge(connection_api::routes(&ctx.identity.connection_version))
        .route("/sdp/:name", get(transport_file))
        .route("/health", get(health))
        .with_state(ctx)
}

/// Run the device's HTTP surface until the task is aborted.
pub async fn run_device(addr: SocketAddr, ctx: Arc<DeviceContext>) -> anyhow::Result<()> {
    let base = ctx.identity.base_url();
    info!(
        "Starting {} (node {}): {} devices, {} flows, {} senders, {} receivers",
        ctx.identity.label,
        ctx.identity.node_id,
        ctx.catalog.devices.len(),
        ctx.catalog.flows.len(),
        ctx.catalog.senders.len(),
        ctx.catalog.receivers.len()
    );
    info!(
        "{}: IS-04 {}/x-nmos/node/{}/ IS-05 {}/x-nmos/connection/{}/",
        ctx.identity.label,
        base,
        ctx.identity.node_version,
        base,
        ctx.identity.connection_version
    );
    let name = ctx.identity.label.clone();
    http::serve(&name, addr, router(ctx)).await
}

async fn transport_file(
    State(ctx): State<Arc<DeviceContext>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let sdp = ctx
        .catalog
        .sender_by_stream(&name)
        .ok_or_else(|| ApiError::not_found("SDP file not found"))?
        .transport_file()?;
    Ok(([(header::CONTENT_TYPE, SDP_CONTENT_TYPE)], sdp))
}

async fn health(State(ctx): State<Arc<DeviceContext>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "node_id": ctx.identity.node_id.to_string(),
        "timestamp": http::timestamp(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{profiles, test_identity};
    use crate::http::testing;
    use crate::types::DeviceProfile;
    use reqwest::StatusCode;

    pub(crate) fn context(profile: DeviceProfile) -> Arc<DeviceContext> {
        let identity = test_identity(8080);
        let catalog = profiles::build(profile, identity.clone()).unwrap();
        Arc::new(DeviceContext::new(identity, catalog))
    }

    pub(crate) async fn spawn_device(profile: DeviceProfile) -> (String, Arc<DeviceContext>) {
        let ctx = context(profile);
        let base = testing::spawn(router(Arc::clone(&ctx))).await;
        (base, ctx)
    }

    #[tokio::test]
    async fn serves_named_transport_files() {
        let (base, _) = spawn_device(DeviceProfile::Encoder).await;
        let resp = reqwest::get(format!("{}/sdp/video1.sdp", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[reqwest::header::CONTENT_TYPE],
            "application/sdp"
        );
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("v=0\r\no=- 0 0 IN IP4 192.168.1.100\r\n"));
        assert!(body.contains("m=video 5004 RTP/AVP 96\r\n"));
    }

    #[tokio::test]
    async fn unknown_transport_file_is_json_not_found() {
        let (base, _) = spawn_device(DeviceProfile::Encoder).await;
        let resp = reqwest::get(format!("{}/sdp/nope.sdp", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "SDP file not found");
    }

    #[tokio::test]
    async fn health_reports_node_id() {
        let (base, ctx) = spawn_device(DeviceProfile::Decoder).await;
        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["node_id"], ctx.identity.node_id.to_string());
        assert!(body["timestamp"].is_string());
    }
}
