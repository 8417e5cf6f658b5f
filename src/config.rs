//! Runtime configuration.
//!
//! Sources are merged in this order, later ones winning:
//! - built-in defaults
//! - a YAML file (`--config` or `ANN_CONFIG`)
//! - `ANN_*` environment variables
//! - command-line flags (applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builder::DEFAULT_BATCH_SIZE;
use crate::embedding::trigram;
use crate::error::{AnnError, Result};
use crate::hnsw::HnswParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnConfig {
    /// Embedding model identifier.
    pub model: String,
    /// Embedding width for models that take one.
    pub dimensions: usize,
    /// Items per embedding call while building.
    pub batch_size: usize,
    /// Examples streamed per query.
    pub n: usize,
    pub hnsw: HnswConfig,
    /// Upper bound for a single embedding call, in milliseconds.
    pub embed_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub no_color: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        let params = HnswParams::default();
        Self {
            m: params.m,
            ef_construction: params.ef_construction,
            ef_search: params.ef_search,
        }
    }
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            model: trigram::MODEL_NAME.to_string(),
            dimensions: 256,
            batch_size: DEFAULT_BATCH_SIZE,
            n: 200,
            hnsw: HnswConfig::default(),
            embed_timeout_ms: None,
            log_level: None,
            no_color: false,
        }
    }
}

impl AnnConfig {
    /// Defaults, then `config_file` (or `ANN_CONFIG`), then the environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ANN_CONFIG").ok().map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::from_yaml_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AnnError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| AnnError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Override fields from `ANN_*` variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = var("ANN_MODEL") {
            self.model = model;
        }
        if let Some(v) = var("ANN_DIMENSIONS") {
            self.dimensions = parse_env("ANN_DIMENSIONS", &v)?;
        }
        if let Some(v) = var("ANN_BATCH_SIZE") {
            self.batch_size = parse_env("ANN_BATCH_SIZE", &v)?;
        }
        if let Some(v) = var("ANN_N") {
            self.n = parse_env("ANN_N", &v)?;
        }
        if let Some(v) = var("ANN_EF_SEARCH") {
            self.hnsw.ef_search = parse_env("ANN_EF_SEARCH", &v)?;
        }
        if let Some(v) = var("ANN_EMBED_TIMEOUT_MS") {
            self.embed_timeout_ms = Some(parse_env("ANN_EMBED_TIMEOUT_MS", &v)?);
        }
        if let Some(level) = var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if var("NO_COLOR").is_some() {
            self.no_color = true;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AnnError::Config("model must not be empty".to_string()));
        }
        if self.dimensions == 0 {
            return Err(AnnError::Config("dimensions must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AnnError::Config("batch_size must be positive".to_string()));
        }
        if self.hnsw.m == 0 {
            return Err(AnnError::Config("hnsw.m must be positive".to_string()));
        }
        if self.hnsw.ef_search == 0 || self.hnsw.ef_construction == 0 {
            return Err(AnnError::Config("hnsw ef values must be positive".to_string()));
        }
        Ok(())
    }

    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams::new(self.hnsw.m, self.hnsw.ef_construction, self.hnsw.ef_search)
    }

    pub fn embed_timeout(&self) -> Option<Duration> {
        self.embed_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AnnError::Config(format!("{} has an invalid value: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnnConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.batch_size, 256);
        assert!(config.embed_timeout().is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AnnConfig::from_yaml("n: 20\nhnsw:\n  ef_search: 80\n").unwrap();
        assert_eq!(config.n, 20);
        assert_eq!(config.hnsw.ef_search, 80);
        assert_eq!(config.hnsw.m, 16);
        assert_eq!(config.batch_size, 256);
    }

    #[test]
    fn test_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ann.yaml");
        std::fs::write(&path, "model: trigram-v1\ndimensions: 64\nembed_timeout_ms: 1500\n").unwrap();

        let config = AnnConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.dimensions, 64);
        assert_eq!(config.embed_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_missing_yaml_file_is_config_error() {
        let err = AnnConfig::from_yaml_file(Path::new("/nonexistent/ann.yaml")).unwrap_err();
        assert!(matches!(err, AnnError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ANN_MODEL", "trigram-v1"),
            ("ANN_BATCH_SIZE", "32"),
            ("ANN_N", "7"),
            ("NO_COLOR", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = AnnConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.n, 7);
        assert!(config.no_color);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = AnnConfig::default();
        let err = config
            .apply_env(|key| (key == "ANN_DIMENSIONS").then(|| "wide".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ANN_DIMENSIONS"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = AnnConfig {
            batch_size: 0,
            ..AnnConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
