//! HTTP server exposing one annotation session to its viewers.

pub mod routes;

use crate::metrics::MetricsCollector;
use crate::session::{Controller, StreamSessionAdapter};
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
#[derive(Debug)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub adapter: Arc<StreamSessionAdapter>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(controller: Arc<Controller>, adapter: Arc<StreamSessionAdapter>) -> Self {
        Self {
            controller,
            adapter,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }
}

/// Serve the session until the process is stopped.
pub async fn start(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
