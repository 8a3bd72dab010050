use axum::{Router, routing::get};
use pkg_constants::network::METRICS_PATH;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::AppState;
use crate::handlers::metrics;

/// Bind the metrics listener. Done before anything is spawned so a bad
/// address fails startup.
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind metrics listener on {}: {}", addr, e))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics::metrics))
        .with_state(state)
}

/// Serve `/metrics` until `shutdown` flips to `true`, then stop accepting
/// and wait for in-flight requests. Bounding that wait is up to the caller.
pub async fn start_server(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Starting metrics server on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                // A dropped sender counts as shutdown too.
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("Metrics server shutting down");
        })
        .await?;

    Ok(())
}
