//! Read-only graph viewer endpoint.
//!
//! Exposes `GET /api/graph`, returning the current [`GraphSnapshot`] for an
//! external visualization to poll while discovery runs. No write path is
//! exposed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::graph::{ConversationGraph, GraphSnapshot};

/// Build the viewer router over a shared graph.
pub fn router(graph: Arc<ConversationGraph>) -> Router {
    Router::new()
        .route("/api/graph", get(graph_handler))
        .with_state(graph)
}

async fn graph_handler(State(graph): State<Arc<ConversationGraph>>) -> Json<GraphSnapshot> {
    Json(graph.snapshot())
}

/// A running viewer server bound to a local address.
pub struct ViewerServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ViewerServer {
    /// Bind and serve the viewer in the background.
    pub async fn start(graph: Arc<ConversationGraph>, host: &str, port: u16) -> AppResult<Self> {
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("failed to bind viewer server: {}", e),
            })?;
        let addr = listener.local_addr().map_err(|e| AppError::Internal {
            message: format!("failed to read viewer address: {}", e),
        })?;

        let app = router(graph);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            info!(%addr, "Graph viewer listening");
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "Viewer server stopped with error");
            }
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The address the viewer is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ViewerServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
