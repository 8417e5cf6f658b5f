//! Index builder: embeds a collection batch by batch and fills a vector index
//! in ordinal order.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::distance::DistanceMetric;
use crate::embedding::{embed_with_timeout, EmbeddingProvider};
use crate::error::{AnnError, Result};
use crate::hnsw::{HnswIndex, HnswParams};
use crate::persistence::manifest::MANIFEST_VERSION;
use crate::persistence::{manifest_path, IndexManifest};
use crate::store::Collection;

pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Item embedded once to learn the provider's output width.
pub const PROBE_ITEM: &str = "Test text right here.";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Items per embedding call. Throughput only; the built index does not depend on it.
    pub batch_size: usize,
    pub params: HnswParams,
    pub embed_timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            params: HnswParams::default(),
            embed_timeout: None,
        }
    }
}

/// Owns the embedding provider for the duration of one or more builds.
#[derive(Debug)]
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    options: BuildOptions,
}

/// A fully built index together with the manifest describing it.
#[derive(Debug)]
pub struct BuiltIndex {
    index: HnswIndex,
    manifest: IndexManifest,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: BuildOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(AnnError::Config("batch size must be at least one".to_string()));
        }
        Ok(Self { provider, options })
    }

    /// Embed every example of `collection` and add it to a fresh index whose
    /// capacity is exactly the collection size.
    pub async fn build(&self, collection: &Collection) -> Result<BuiltIndex> {
        let started = Instant::now();
        let timeout = self.options.embed_timeout;

        let probe = embed_with_timeout(self.provider.as_ref(), &[PROBE_ITEM.to_string()], timeout).await?;
        let dimension = probe[0].len();
        if dimension == 0 {
            return Err(AnnError::Embedding(format!(
                "provider '{}' returned an empty probe embedding",
                self.provider.model_name()
            )));
        }

        let total = collection.len();
        let mut index = HnswIndex::init(total, dimension, self.options.params.clone());
        index.set_collection_fingerprint(collection.fingerprint());

        tracing::info!(
            examples = total,
            dimension,
            model = self.provider.model_name(),
            batch_size = self.options.batch_size,
            "building index"
        );

        let mut start = 0;
        while start < total {
            let end = (start + self.options.batch_size).min(total);
            let items = collection.embed_inputs(start..end);
            let vectors = embed_with_timeout(self.provider.as_ref(), &items, timeout).await?;

            if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
                return Err(AnnError::DimensionMismatch {
                    expected: dimension,
                    actual: bad.len(),
                });
            }

            let ids = index.add_items(&vectors)?;
            debug_assert_eq!(ids, start..end);
            tracing::debug!(done = end, total, "indexed batch");
            start = end;
        }

        tracing::info!(
            examples = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "indexed all examples"
        );

        let manifest = IndexManifest {
            format_version: MANIFEST_VERSION,
            collection_size: total,
            dimension,
            model: self.provider.model_name().to_string(),
            fingerprint: collection.fingerprint().to_string(),
            metric: DistanceMetric::Cosine,
            params: self.options.params.clone(),
        };
        Ok(BuiltIndex { index, manifest })
    }
}

impl BuiltIndex {
    pub fn index(&self) -> &HnswIndex {
        &self.index
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Write the index file to `path` and its manifest next to it, replacing
    /// both if present. If either write fails, neither file is left behind.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.index.save(path)?;
        if let Err(e) = self.manifest.save(path) {
            let _ = std::fs::remove_file(path);
            return Err(e);
        }
        tracing::info!(
            path = %path.display(),
            manifest = %manifest_path(path).display(),
            "index stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TrigramProvider;
    use crate::example::Example;
    use crate::store::Modality;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Widening;

    #[async_trait::async_trait]
    impl EmbeddingProvider for Widening {
        fn model_name(&self) -> &str {
            "widening"
        }

        fn dimensions(&self) -> usize {
            2
        }

        // Probe gets width 2, real batches width 3.
        async fn embed_batch(&self, items: &[String]) -> Result<Vec<Vec<f32>>> {
            let width = if items.len() == 1 && items[0] == PROBE_ITEM { 2 } else { 3 };
            Ok(items.iter().map(|_| vec![1.0; width]).collect())
        }
    }

    fn collection(n: usize) -> Collection {
        let examples = (0..n).map(|i| Example::text(format!("example number {}", i))).collect();
        Collection::from_examples("mem", examples, Modality::Text.normalizer()).unwrap()
    }

    fn builder(batch_size: usize) -> IndexBuilder {
        IndexBuilder::new(
            Arc::new(TrigramProvider::new(64)),
            BuildOptions { batch_size, ..BuildOptions::default() },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_fills_to_capacity() {
        let built = builder(4).build(&collection(10)).await.unwrap();
        assert_eq!(built.index().len(), 10);
        assert_eq!(built.index().capacity(), 10);
        assert_eq!(built.index().dimension(), 64);
        assert_eq!(built.manifest().collection_size, 10);
        assert_eq!(built.manifest().model, "trigram-v1");
    }

    #[tokio::test]
    async fn test_result_is_batch_size_independent() {
        let c = collection(25);
        let a = builder(1).build(&c).await.unwrap();
        let b = builder(256).build(&c).await.unwrap();

        let query = TrigramProvider::new(64).embed_text("example number 7");
        assert_eq!(
            a.index().knn_query(&query, 5).unwrap(),
            b.index().knn_query(&query, 5).unwrap()
        );
    }

    #[tokio::test]
    async fn test_dimension_drift_fails() {
        let builder = IndexBuilder::new(Arc::new(Widening), BuildOptions::default()).unwrap();
        let err = builder.build(&collection(3)).await.unwrap_err();
        assert!(matches!(err, AnnError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = IndexBuilder::new(
            Arc::new(TrigramProvider::new(8)),
            BuildOptions { batch_size: 0, ..BuildOptions::default() },
        );
        assert!(matches!(result, Err(AnnError::Config(_))));
    }

    #[tokio::test]
    async fn test_persist_writes_index_and_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ten.index");
        let built = builder(3).build(&collection(10)).await.unwrap();

        built.persist(&path).unwrap();
        built.persist(&path).unwrap();

        assert!(path.exists());
        assert!(manifest_path(&path).exists());
        assert_eq!(HnswIndex::load(&path, 10).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_failed_manifest_write_leaves_no_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ten.index");
        std::fs::create_dir(manifest_path(&path)).unwrap();
        let built = builder(3).build(&collection(10)).await.unwrap();

        assert!(built.persist(&path).is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_index_carries_collection_fingerprint() {
        let c = collection(4);
        let built = builder(2).build(&c).await.unwrap();
        assert_eq!(built.index().collection_fingerprint(), Some(c.fingerprint()));
    }
}
