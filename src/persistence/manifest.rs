//! Sidecar manifest recording what an index file was built from.
//!
//! The index file itself only knows its vectors. The manifest pins the
//! collection size, the collection fingerprint and the embedding model, which
//! together form the index's implicit schema.

use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};
use crate::hnsw::HnswParams;
use crate::persistence::serialization;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub collection_size: usize,
    pub dimension: usize,
    pub model: String,
    /// SHA-256 over the ordered, serialized examples of the source collection.
    pub fingerprint: String,
    pub metric: DistanceMetric,
    pub params: HnswParams,
}

/// `<index path>.manifest.json`
pub fn manifest_path(index_path: &Path) -> PathBuf {
    let mut name = index_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".manifest.json");
    index_path.with_file_name(name)
}

impl IndexManifest {
    pub fn save(&self, index_path: &Path) -> Result<()> {
        serialization::write_atomic(&manifest_path(index_path), &serialization::to_json(self)?)
    }

    pub fn load(index_path: &Path) -> Result<Self> {
        let path = manifest_path(index_path);
        let bytes = fs::read(&path).map_err(|e| {
            AnnError::IndexError(format!(
                "Cannot read index manifest {}: {}; rebuild the index",
                path.display(),
                e
            ))
        })?;
        let manifest: IndexManifest = serialization::from_json(&bytes)?;
        if manifest.format_version != MANIFEST_VERSION {
            return Err(AnnError::IndexError(format!(
                "Unsupported manifest version {}; rebuild the index",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    /// Check that this index may serve `collection_size` examples with the
    /// given fingerprint using `model`.
    pub fn check_compatible(
        &self,
        collection_size: usize,
        fingerprint: &str,
        model: &str,
        dimension: usize,
    ) -> Result<()> {
        if self.collection_size != collection_size {
            return Err(AnnError::CapacityMismatch {
                indexed: self.collection_size,
                collection: collection_size,
            });
        }
        if self.model != model {
            return Err(AnnError::ModelMismatch {
                built_with: self.model.clone(),
                current: model.to_string(),
            });
        }
        if self.dimension != dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }
        if self.fingerprint != fingerprint {
            return Err(AnnError::CollectionMismatch);
        }
        Ok(())
    }
}
