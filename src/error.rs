//! Error types for index building, querying and session streaming

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for ann_stream operations
pub type Result<T> = std::result::Result<T, AnnError>;

/// Coarse failure classes. None of them is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unreadable or empty example source.
    Source,
    /// The persisted index does not belong to this collection/model. Rebuild it.
    IndexCompatibility,
    /// More results requested than the index holds.
    CapacityExceeded,
    /// A reset arrived while another reset was still running.
    ConcurrentReset,
    /// Blank query string.
    QueryEmpty,
    /// The embedding provider failed or timed out.
    Embedding,
    /// I/O, serialization or index corruption.
    Internal,
}

/// Error types that can occur while building, opening or querying an index
#[derive(Error, Debug)]
pub enum AnnError {
    #[error("Source not found or unreadable: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source {path} produced no examples")]
    EmptyCollection { path: PathBuf },

    #[error("Invalid source: {0}")]
    Source(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Index capacity mismatch: index holds {indexed} elements but the collection has {collection}; rebuild the index"
    )]
    CapacityMismatch { indexed: usize, collection: usize },

    #[error(
        "Embedding model mismatch: index was built with '{built_with}' but '{current}' is loaded; rebuild the index"
    )]
    ModelMismatch { built_with: String, current: String },

    #[error("Index was built from a different collection (fingerprint mismatch); rebuild the index")]
    CollectionMismatch,

    #[error("Index capacity exceeded: capacity is {capacity}, tried to hold {requested}")]
    CapacityExceeded { capacity: usize, requested: usize },

    #[error("Requested {requested} results but the index only holds {available} elements")]
    InsufficientElements { requested: usize, available: usize },

    #[error("A stream reset is already in progress for this session")]
    ConcurrentReset,

    #[error("Query must not be empty")]
    QueryEmpty,

    #[error("Embedding call timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Index error: {0}")]
    IndexError(String),
}

impl AnnError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnnError::SourceNotFound { .. } | AnnError::EmptyCollection { .. } | AnnError::Source(_) => {
                ErrorCategory::Source
            }
            AnnError::DimensionMismatch { .. }
            | AnnError::CapacityMismatch { .. }
            | AnnError::ModelMismatch { .. }
            | AnnError::CollectionMismatch => ErrorCategory::IndexCompatibility,
            AnnError::CapacityExceeded { .. } | AnnError::InsufficientElements { .. } => {
                ErrorCategory::CapacityExceeded
            }
            AnnError::ConcurrentReset => ErrorCategory::ConcurrentReset,
            AnnError::QueryEmpty => ErrorCategory::QueryEmpty,
            AnnError::EmbeddingTimeout(_) | AnnError::Embedding(_) => ErrorCategory::Embedding,
            AnnError::InvalidVector { .. }
            | AnnError::Config(_)
            | AnnError::Session(_)
            | AnnError::IoError(_)
            | AnnError::SerializationError(_)
            | AnnError::IndexError(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for AnnError {
    fn from(err: serde_json::Error) -> Self {
        AnnError::SerializationError(err.to_string())
    }
}
