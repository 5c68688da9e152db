//! Plumbing shared by every HTTP surface in the daemon.

use std::any::Any;
use std::net::SocketAddr;

use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use log::info;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;

/// Register `handler` at `path` and at `path/`; NMOS clients disagree on
/// trailing slashes.
pub fn route_both<S>(router: Router<S>, path: &str, handler: MethodRouter<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route(path, handler.clone())
        .route(&format!("{}/", path), handler)
}

/// Body of every version-discovery endpoint.
pub fn versions(version: &str) -> Json<Vec<String>> {
    Json(vec![version.to_string()])
}

/// RFC 3339 UTC timestamp for health responses.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = err.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = err.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(detail).into_response()
}

/// Apply the layers every service shares: a 500 for handler panics and
/// permissive CORS for browser-based controllers.
pub fn finish(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
}

/// Serve `router` on an already bound listener until the task is aborted.
pub async fn serve_on(name: &str, listener: TcpListener, router: Router) -> anyhow::Result<()> {
    info!("{} listening on http://{}", name, listener.local_addr()?);
    axum::serve(listener, finish(router)).await?;
    Ok(())
}

pub async fn serve(name: &str, addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(name, listener, router).await
}
