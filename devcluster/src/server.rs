use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{delete, get, post},
};
use devcluster_common::shutdown::shutdown_signal;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;

/// Shared application state. No auth — the HTTP surface is a thin,
/// unauthenticated convenience over the Coordinator; authn/authz live
/// outside this crate's scope.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<devcluster_core::Runtime>,
}

pub async fn run_server(port: u16, runtime: Arc<devcluster_core::Runtime>) -> Result<()> {
    let state = AppState { runtime };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/readyz", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/requests", post(handlers::create_request))
        .route("/requests/{id}", get(handlers::get_request))
        .route("/zones/{zone}/clusters", get(handlers::get_zone_clusters))
        .route("/clusters/{id}", delete(handlers::delete_cluster))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    tracing::info!(%addr, "starting devcluster HTTP server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind HTTP listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped gracefully");
    Ok(())
}
