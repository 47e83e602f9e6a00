//! HTTP server

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;

use netsim_engine::NetworkEngine;

use crate::routes::create_router;

/// Errors from the HTTP server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),
}

/// Bind `addr` and serve the API until `shutdown` resolves.
///
/// Open event streams are closed when shutdown begins.
pub async fn serve<F>(addr: SocketAddr, engine: NetworkEngine, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

    info!("API server stopped");
    Ok(())
}
