//! HTTP server lifecycle.
//!
//! bind → spawn background task → return a handle with a shutdown channel.
//! The audit buffer is flushed once the server has drained.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Signal a graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Shut down and wait for in-flight requests to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

/// Bind `addr` (port 0 picks a free port) and serve the API in a background task.
pub async fn start_server(core: Arc<CoreState>, addr: &str) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let local = listener.local_addr()?;

    let app = api_router(core.clone());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };
        tracing::info!(addr = %local, "API server started");
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await {
            tracing::error!("API server error: {e}");
        }
        if let Err(e) = core.flush_and_prune_audit() {
            tracing::warn!("Final audit flush failed: {e}");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr: local,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}
