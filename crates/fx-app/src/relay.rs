//! Same-origin relay: holds no state, only attaches the caller's API key to
//! an upstream request, plus the static model catalog.

mod error;
mod routes;
pub mod schemas;
mod state;

use crate::config::AppConfig;
use crate::relay::routes::api_routes;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::{ServerError, ServerResult};
pub use state::RelayState;

pub fn router(state: RelayState) -> Router {
    Router::new()
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Runs the relay until Ctrl-C.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let state = RelayState::new(&config.upstream_base, config.http_timeout)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, upstream = %config.upstream_base, "Relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Relay shutting down");
        })
        .await?;

    Ok(())
}
