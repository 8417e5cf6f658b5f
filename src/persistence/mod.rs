//! Persistence layer: the index file and its manifest sidecar.

pub mod index_file;
pub mod manifest;
pub mod serialization;

pub use manifest::{manifest_path, IndexManifest};
