//! HTTP scrape server

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use kmon_core::exposition::CONTENT_TYPE;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::expose::{expose_cluster, expose_clusters};
use crate::store::MetricsStore;

/// HTTP server exposing the latest cluster snapshots
pub struct MetricsServer {
    addr: SocketAddr,
    store: MetricsStore,
}

impl MetricsServer {
    pub fn new(addr: SocketAddr, store: MetricsStore) -> Self {
        Self { addr, store }
    }

    /// Routes served by [`MetricsServer::start`], usable on their own in tests.
    pub fn router(store: MetricsStore) -> Router {
        Router::new()
            .route("/metrics", get(all_clusters_handler))
            .route("/metrics/:cluster", get(cluster_handler))
            .route("/internal/metrics", get(internal_handler))
            .route("/health", get(health_handler))
            .with_state(store)
    }

    /// Bind and serve until the listener fails
    pub async fn start(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting metrics server");
        axum::serve(listener, Self::router(self.store).into_make_service()).await
    }
}

fn exposition(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

async fn all_clusters_handler(State(store): State<MetricsStore>) -> Response {
    exposition(expose_clusters(&store.snapshot().await))
}

async fn cluster_handler(
    State(store): State<MetricsStore>,
    Path(cluster): Path<String>,
) -> Response {
    match store.get(&cluster).await {
        Some(metrics) => exposition(expose_cluster(&cluster, &metrics)),
        None => (StatusCode::NOT_FOUND, format!("Unknown cluster: {}", cluster)).into_response(),
    }
}

async fn internal_handler() -> Response {
    match crate::exporter::export_metrics() {
        Ok(metrics) => exposition(metrics),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error exporting metrics: {}", e),
        )
            .into_response(),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
