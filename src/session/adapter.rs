//! Feeds query results into a live session and re-queries it on demand.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AnnError, Result};
use crate::example::Example;
use crate::query::QueryHandle;
use crate::session::controller::{Controller, SessionHost};
use crate::session::stream::Stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    Streaming,
    /// A reset is between querying and swapping the queue.
    Resetting,
}

/// A viewer asking for the stream to be rebuilt around a new query.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetEvent {
    pub query: String,
    /// The viewer that triggered the reset, if any. It is handed the returned
    /// example directly, so its cursor moves past it.
    #[serde(default)]
    pub viewer: Option<String>,
}

impl ResetEvent {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            viewer: None,
        }
    }

    pub fn from_viewer(query: impl Into<String>, viewer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            viewer: Some(viewer.into()),
        }
    }
}

#[derive(Debug)]
pub struct StreamSessionAdapter {
    engine: Arc<QueryHandle>,
    n: usize,
    reset_lock: Mutex<()>,
    current_query: RwLock<Option<String>>,
}

impl StreamSessionAdapter {
    /// `n` is the number of examples each query streams; it must fit the index.
    pub fn new(engine: Arc<QueryHandle>, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(AnnError::Config("n must be at least one".to_string()));
        }
        if n > engine.capacity() {
            return Err(AnnError::InsufficientElements {
                requested: n,
                available: engine.capacity(),
            });
        }
        Ok(Self {
            engine,
            n,
            reset_lock: Mutex::new(()),
            current_query: RwLock::new(None),
        })
    }

    /// Open a session streaming the results for `query`.
    pub async fn start(&self, query: &str) -> Result<Controller> {
        let result = self.engine.query(query, self.n).await?;
        self.set_current(query);
        tracing::info!(query, examples = result.len(), "session stream started");
        Ok(Controller::new(Stream::from_examples(result.into_examples())))
    }

    /// Re-query and swap `host`'s queue in one step, keeping its
    /// transformation chain. Returns the new first example.
    ///
    /// Fails with `ConcurrentReset` while another reset on this adapter is
    /// still running. On any failure the host's stream is left untouched.
    pub async fn reset(&self, host: &dyn SessionHost, event: ResetEvent) -> Result<Example> {
        if event.query.trim().is_empty() {
            return Err(AnnError::QueryEmpty);
        }
        let _guard = self
            .reset_lock
            .try_lock()
            .map_err(|_| AnnError::ConcurrentReset)?;

        tracing::info!(query = %event.query, viewer = ?event.viewer, "resetting stream");
        let result = self.engine.query(&event.query, self.n).await?;
        let first = host
            .replace_queue(result.into_examples(), true, event.viewer.as_deref())?
            .ok_or_else(|| AnnError::Session(format!("query '{}' produced no examples", event.query)))?;

        // The swap has happened; nothing below may fail.
        self.set_current(&event.query);
        tracing::info!(
            query = %event.query,
            viewers = ?host.viewers().map(|v| v.len()).ok(),
            "stream reset"
        );
        Ok(first)
    }

    pub fn state(&self) -> AdapterState {
        match self.reset_lock.try_lock() {
            Ok(_) => AdapterState::Streaming,
            Err(_) => AdapterState::Resetting,
        }
    }

    /// The query the session currently streams.
    pub fn current_query(&self) -> Option<String> {
        self.current_query
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn engine(&self) -> &Arc<QueryHandle> {
        &self.engine
    }

    fn set_current(&self, query: &str) {
        let mut current = self
            .current_query
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Some(query.to_string());
    }
}
