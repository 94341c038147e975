pub use crate::common::RouteResult;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use platform::RidePlatform;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod common;

/// Shared state for every handler: one `RidePlatform` behind an `Arc`, no
/// per-request database pool to check out (§6 binding — this layer owns no
/// storage of its own).
#[derive(Clone, FromRef)]
pub struct WebState {
    pub platform: Arc<RidePlatform>,
}

pub async fn start_web_server(state: WebState, addr: &str) -> std::io::Result<()> {
    let routes = Router::new()
        .nest_service("/api", api::routes(state))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, routes.into_make_service()).await?;

    Ok(())
}
