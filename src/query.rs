//! Query engine: a loaded index bound to the collection it was built from.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::builder::PROBE_ITEM;
use crate::embedding::{embed_with_timeout, EmbeddingProvider};
use crate::error::{AnnError, Result};
use crate::example::{strip_base64, Example};
use crate::hnsw::HnswIndex;
use crate::persistence::IndexManifest;
use crate::store::Collection;

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Overrides the ef_search the index was built with.
    pub ef_search: Option<usize>,
    pub embed_timeout: Option<Duration>,
}

/// One retrieved example.
#[derive(Debug, Clone)]
pub struct Hit {
    /// Copy of the stored example with `meta.distance`, `meta.index` and
    /// `meta.query` attached.
    pub example: Example,
    pub distance: f32,
    /// 0-based position in the result.
    pub rank: usize,
}

/// Examples nearest to one query, ascending by distance. Order among equal
/// distances is not stable.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    query: String,
    hits: Vec<Hit>,
}

impl RetrievalResult {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn into_examples(self) -> Vec<Example> {
        self.hits.into_iter().map(|h| h.example).collect()
    }

    /// Write one JSON record per hit to `path`.
    pub fn write_jsonl(&self, path: impl AsRef<Path>, remove_base64: bool) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(fs::File::create(path)?);
        for hit in &self.hits {
            let example = if remove_base64 {
                strip_base64(hit.example.clone())
            } else {
                hit.example.clone()
            };
            serde_json::to_writer(&mut out, &example)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        tracing::info!(path = %path.display(), count = self.hits.len(), "stored retrieval result");
        Ok(())
    }
}

/// A persisted index reopened against its collection and embedding provider.
///
/// Callers must pass the provider the index was built with; the manifest's
/// model name is checked on open.
#[derive(Debug)]
pub struct QueryHandle {
    collection: Arc<Collection>,
    index: HnswIndex,
    provider: Arc<dyn EmbeddingProvider>,
    manifest: IndexManifest,
    embed_timeout: Option<Duration>,
}

impl QueryHandle {
    /// Load the index at `index_path`, declaring the collection size as its capacity.
    pub async fn open(
        collection: Arc<Collection>,
        index_path: impl AsRef<Path>,
        provider: Arc<dyn EmbeddingProvider>,
        options: QueryOptions,
    ) -> Result<Self> {
        let index_path = index_path.as_ref();
        let manifest = IndexManifest::load(index_path)?;

        let probe = embed_with_timeout(
            provider.as_ref(),
            &[PROBE_ITEM.to_string()],
            options.embed_timeout,
        )
        .await?;
        manifest.check_compatible(
            collection.len(),
            collection.fingerprint(),
            provider.model_name(),
            probe[0].len(),
        )?;

        let mut index = HnswIndex::load(index_path, collection.len())?;
        if index.dimension() != manifest.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: manifest.dimension,
                actual: index.dimension(),
            });
        }
        // The manifest and index are renamed into place separately; a stale
        // manifest must not vouch for vectors built from another collection.
        if index.collection_fingerprint() != Some(collection.fingerprint()) {
            return Err(AnnError::CollectionMismatch);
        }
        if let Some(ef) = options.ef_search {
            index.set_ef_search(ef);
        }

        tracing::info!(
            path = %index_path.display(),
            examples = collection.len(),
            model = provider.model_name(),
            metric = index.metric().name(),
            "loaded index"
        );

        Ok(Self {
            collection,
            index,
            provider,
            manifest,
            embed_timeout: options.embed_timeout,
        })
    }

    /// The `n` examples nearest to `query`.
    pub async fn query(&self, query: &str, n: usize) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(AnnError::QueryEmpty);
        }
        if n > self.capacity() {
            return Err(AnnError::InsufficientElements {
                requested: n,
                available: self.capacity(),
            });
        }

        tracing::info!(query, n, "creating new stream");
        let embedding = embed_with_timeout(
            self.provider.as_ref(),
            &[query.to_string()],
            self.embed_timeout,
        )
        .await?
        .remove(0);

        let (ids, distances) = self.index.knn_query(&embedding, n)?;

        let hits = ids
            .into_iter()
            .zip(distances)
            .enumerate()
            .map(|(rank, (ordinal, distance))| {
                let mut example = self
                    .collection
                    .get(ordinal)
                    .cloned()
                    .ok_or_else(|| {
                        AnnError::IndexError(format!(
                            "neighbor {} is outside the collection of {}",
                            ordinal,
                            self.collection.len()
                        ))
                    })?;
                example.set_meta("index", Value::from(ordinal));
                example.set_meta("distance", Value::from(distance as f64));
                example.set_meta("query", Value::from(query));
                Ok(Hit { example, distance, rank })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RetrievalResult {
            query: query.to_string(),
            hits,
        })
    }

    /// Number of indexed examples; the largest `n` a query may ask for.
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Release the index and provider.
    pub fn close(self) {
        tracing::debug!(examples = self.collection.len(), "closing query handle");
    }
}
