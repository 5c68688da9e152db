//! IS-05 Connection API over the device's [`ConnectionStore`].
//!
//! [`ConnectionStore`]: crate::connection::ConnectionStore

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use super::DeviceContext;
use crate::connection::{ConnectionPatch, EndpointRole, PatchError, StateView};
use crate::error::{ApiError, ApiResult};
use crate::http::{route_both, versions};
use crate::sdp::SDP_CONTENT_TYPE;

type Ctx = State<Arc<DeviceContext>>;

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

pub(super) fn routes(version: &str) -> Router<Arc<DeviceContext>> {
    let base = format!("/x-nmos/connection/{}", version);
    let listed = version.to_string();
    let discovery = get(move || {
        let version = listed.clone();
        async move { versions(&version) }
    });

    let mut router = route_both(Router::new(), "/x-nmos/connection", discovery.clone());
    router = route_both(router, &base, discovery);
    router = route_both(
        router,
        &format!("{}/single", base),
        get(|| async { Json(["senders/", "receivers/"]) }),
    );
    router = endpoint_routes(router, &format!("{}/single/senders", base), EndpointRole::Sender);
    router = endpoint_routes(router, &format!("{}/single/receivers", base), EndpointRole::Receiver);
    route_both(
        router,
        &format!("{}/single/senders/:id/transportfile", base),
        get(sender_transport_file),
    )
}

fn endpoint_routes(
    router: Router<Arc<DeviceContext>>,
    prefix: &str,
    role: EndpointRole,
) -> Router<Arc<DeviceContext>> {
    let mut router = route_both(
        router,
        prefix,
        get(move |State(ctx): Ctx| list(ctx, role)),
    );
    router = route_both(
        router,
        &format!("{}/:id", prefix),
        get(move |State(ctx): Ctx, Path(id): Path<String>| single(ctx, role, id)),
    );
    router = route_both(
        router,
        &format!("{}/:id/active", prefix),
        get(move |State(ctx): Ctx, Path(id): Path<String>| active(ctx, role, id)),
    );
    route_both(
        router,
        &format!("{}/:id/staged", prefix),
        get(move |State(ctx): Ctx, Path(id): Path<String>| staged(ctx, role, id)).patch(
            move |State(ctx): Ctx, Path(id): Path<String>, body: Bytes| {
                patch_staged(ctx, role, id, body)
            },
        ),
    )
}

fn render(view: StateView<'_>) -> Response {
    Json(view).into_response()
}

async fn list(ctx: Arc<DeviceContext>, role: EndpointRole) -> Response {
    let listed = ctx.connections.list_staged(role).await;
    let views: Vec<StateView<'_>> = listed
        .iter()
        .map(|(id, state)| state.view(role).with_id(id))
        .collect();
    Json(views).into_response()
}

async fn single(ctx: Arc<DeviceContext>, role: EndpointRole, id: String) -> ApiResult<Response> {
    let state = ctx.connections.staged(role, &id).await?;
    Ok(render(state.view(role).with_id(&id)))
}

async fn staged(ctx: Arc<DeviceContext>, role: EndpointRole, id: String) -> ApiResult<Response> {
    let state = ctx.connections.staged(role, &id).await?;
    Ok(render(state.view(role)))
}

async fn active(ctx: Arc<DeviceContext>, role: EndpointRole, id: String) -> ApiResult<Response> {
    let state = ctx.connections.active(role, &id).await?;
    Ok(render(state.view(role)))
}

async fn patch_staged(
    ctx: Arc<DeviceContext>,
    role: EndpointRole,
    id: String,
    body: Bytes,
) -> ApiResult<Response> {
    if !ctx.connections.contains(role, &id) {
        return Err(ApiError::not_found(format!("{} not found: {}", role.as_str(), id)));
    }
    let patch = ConnectionPatch::from_slice(&body)?;
    let state = ctx.connections.patch(role, &id, &patch).await?;
    Ok(render(state.view(role)))
}

async fn sender_transport_file(State(ctx): Ctx, Path(id): Path<String>) -> ApiResult<Response> {
    let sender = ctx
        .catalog
        .sender(&id)
        .ok_or_else(|| ApiError::not_found(format!("sender not found: {}", id)))?;
    let sdp = sender.transport_file()?;
    Ok(([(header::CONTENT_TYPE, SDP_CONTENT_TYPE)], sdp).into_response())
}
