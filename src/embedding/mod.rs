//! Embedding providers.
//!
//! The model identity is part of an index's schema: vectors embedded by one
//! model are meaningless to another, so every index records the model name
//! and refuses to open under a different one.

pub mod trigram;

pub use trigram::TrigramProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AnnError, Result};

/// Maps raw items to fixed-width vectors.
///
/// Implementations must return one vector per item, be deterministic for a
/// given model version and keep the width constant across calls.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Model identifier recorded in index manifests.
    fn model_name(&self) -> &str;

    /// Width of the vectors this provider returns.
    fn dimensions(&self) -> usize;

    /// Embed a batch of items.
    async fn embed_batch(&self, items: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single item.
    async fn embed(&self, item: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[item.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AnnError::Embedding("No embedding returned".to_string()))
    }
}

/// Run `embed_batch`, bounded by `timeout` when given, and check that one
/// vector came back per item (`DimensionMismatch` otherwise).
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    items: &[String],
    timeout: Option<Duration>,
) -> Result<Vec<Vec<f32>>> {
    let vectors = match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.embed_batch(items))
            .await
            .map_err(|_| AnnError::EmbeddingTimeout(limit))??,
        None => provider.embed_batch(items).await?,
    };

    // A short or long batch would shift every later ordinal.
    if vectors.len() != items.len() {
        tracing::warn!(
            model = provider.model_name(),
            returned = vectors.len(),
            items = items.len(),
            "embedding batch has the wrong number of vectors"
        );
        return Err(AnnError::DimensionMismatch {
            expected: items.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Create an embedding provider for a model identifier.
pub fn create_provider(model: &str, dimensions: usize) -> Result<Arc<dyn EmbeddingProvider>> {
    if dimensions == 0 {
        return Err(AnnError::Config("Embedding dimensions must be positive".to_string()));
    }
    match model {
        trigram::MODEL_NAME => Ok(Arc::new(TrigramProvider::new(dimensions))),
        _ => Err(AnnError::Config(format!(
            "Unknown embedding model: '{}'. Supported models: {}",
            model,
            trigram::MODEL_NAME
        ))),
    }
}
