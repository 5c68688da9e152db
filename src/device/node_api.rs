//! IS-04 Node API: self-description and the static resource lists.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::DeviceContext;
use crate::catalog::{Device, Flow, NodeSelf, Receiver, Sender};
use crate::http::{route_both, versions};

type Ctx = State<Arc<DeviceContext>>;

pub(super) fn routes(version: &str) -> Router<Arc<DeviceContext>> {
    let base = format!("/x-nmos/node/{}", version);
    let listed = version.to_string();
    let discovery = get(move || {
        let version = listed.clone();
        async move { versions(&version) }
    });

    let mut router = route_both(Router::new(), "/x-nmos/node", discovery.clone());
    router = route_both(router, &base, discovery);
    router = route_both(router, &format!("{}/self", base), get(node_self));
    router = route_both(router, &format!("{}/devices", base), get(devices));
    router = route_both(router, &format!("{}/flows", base), get(flows));
    router = route_both(router, &format!("{}/senders", base), get(senders));
    route_both(router, &format!("{}/receivers", base), get(receivers))
}

async fn node_self(State(ctx): Ctx) -> Json<NodeSelf> {
    Json(ctx.catalog.node.clone())
}

async fn devices(State(ctx): Ctx) -> Json<Vec<Device>> {
    Json(ctx.catalog.devices.clone())
}

async fn flows(State(ctx): Ctx) -> Json<Vec<Flow>> {
    Json(ctx.catalog.flows.clone())
}

async fn senders(State(ctx): Ctx) -> Json<Vec<Sender>> {
    Json(ctx.catalog.senders.clone())
}

async fn receivers(State(ctx): Ctx) -> Json<Vec<Receiver>> {
    Json(ctx.catalog.receivers.clone())
}
