//! # ann_stream
//!
//! Approximate nearest-neighbor retrieval that feeds live annotation sessions.
//!
//! This library provides:
//! - An example store that loads JSONL, JSON or image-directory sources
//! - An index builder that embeds examples in batches into a cosine HNSW index
//! - A query engine that reopens a persisted index and joins hits back to examples
//! - A stream session adapter that re-queries a running session in place
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ann_stream::builder::{BuildOptions, IndexBuilder};
//! use ann_stream::embedding::{EmbeddingProvider, TrigramProvider};
//! use ann_stream::query::{QueryHandle, QueryOptions};
//! use ann_stream::store::{self, Modality};
//!
//! # async fn run() -> ann_stream::Result<()> {
//! let collection = Arc::new(store::load("news.jsonl", Modality::Text.normalizer())?);
//! let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(256));
//!
//! IndexBuilder::new(provider.clone(), BuildOptions::default())?
//!     .build(&collection)
//!     .await?
//!     .persist("news.index")?;
//!
//! let handle = QueryHandle::open(collection, "news.index", provider, QueryOptions::default()).await?;
//! let result = handle.query("benchmarks", 10).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod distance;
pub mod embedding;
pub mod error;
pub mod example;
pub mod hnsw;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod query;
pub mod server;
pub mod session;
pub mod store;

pub use builder::{BuildOptions, BuiltIndex, IndexBuilder};
pub use config::AnnConfig;
pub use distance::DistanceMetric;
pub use embedding::EmbeddingProvider;
pub use error::{AnnError, ErrorCategory, Result};
pub use example::Example;
pub use hnsw::{HnswIndex, HnswParams};
pub use query::{QueryHandle, QueryOptions, RetrievalResult};
pub use session::{Controller, ResetEvent, SessionHost, StreamSessionAdapter};
pub use store::{Collection, Modality};
