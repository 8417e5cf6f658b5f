//! Example store: loads a source into an ordered, fixed collection.
//!
//! An example's ordinal (its position in read order) is the ID it gets in the
//! vector index, so the collection is never reordered or filtered after load.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::{AnnError, Result};
use crate::example::Example;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Which kind of content the examples carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn normalizer(&self) -> Arc<dyn ExampleNormalizer> {
        match self {
            Modality::Text => Arc::new(TextNormalizer),
            Modality::Image => Arc::new(ImageNormalizer),
        }
    }
}

/// Per-modality pipeline run on every example at load time, plus the rule for
/// what string of an example gets embedded.
pub trait ExampleNormalizer: Send + Sync + fmt::Debug {
    fn modality(&self) -> Modality;

    fn normalize(&self, example: Example) -> Example;

    /// The item handed to the embedding provider, or `None` if the example
    /// lacks the field this modality embeds.
    fn embed_input(&self, example: &Example) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl ExampleNormalizer for TextNormalizer {
    fn modality(&self) -> Modality {
        Modality::Text
    }

    fn normalize(&self, mut example: Example) -> Example {
        example.set_hashes();
        example
    }

    fn embed_input(&self, example: &Example) -> Option<String> {
        example.get_str("text").map(str::to_string)
    }
}

/// Images embed from `image` (a path or URL) and fall back to `path`.
/// Inline `data:` payloads are stripped on output, see [`crate::example::strip_base64`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ExampleNormalizer for ImageNormalizer {
    fn modality(&self) -> Modality {
        Modality::Image
    }

    fn normalize(&self, mut example: Example) -> Example {
        example.set_hashes();
        example
    }

    fn embed_input(&self, example: &Example) -> Option<String> {
        example
            .get_str("image")
            .or_else(|| example.get_str("path"))
            .map(str::to_string)
    }
}

/// An ordered, immutable collection of examples loaded from one source.
#[derive(Debug, Clone)]
pub struct Collection {
    examples: Vec<Example>,
    source: PathBuf,
    fingerprint: String,
    normalizer: Arc<dyn ExampleNormalizer>,
}

impl Collection {
    /// Build a collection from already-read examples, normalizing each in order.
    pub fn from_examples(
        source: impl Into<PathBuf>,
        examples: Vec<Example>,
        normalizer: Arc<dyn ExampleNormalizer>,
    ) -> Result<Self> {
        let source = source.into();
        if examples.is_empty() {
            return Err(AnnError::EmptyCollection { path: source });
        }

        let examples: Vec<Example> = examples
            .into_iter()
            .map(|ex| normalizer.normalize(ex))
            .collect();

        if let Some(pos) = examples
            .iter()
            .position(|ex| normalizer.embed_input(ex).is_none())
        {
            return Err(AnnError::Source(format!(
                "example {} in {} has no content to embed for {:?} examples",
                pos,
                source.display(),
                normalizer.modality()
            )));
        }

        let fingerprint = fingerprint(&examples)?;
        Ok(Self {
            examples,
            source,
            fingerprint,
            normalizer,
        })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The example at `ordinal`.
    pub fn get(&self, ordinal: usize) -> Option<&Example> {
        self.examples.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.examples.iter()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn modality(&self) -> Modality {
        self.normalizer.modality()
    }

    /// Embedding inputs for `ordinals`, in order.
    pub fn embed_inputs(&self, ordinals: std::ops::Range<usize>) -> Vec<String> {
        self.examples[ordinals]
            .iter()
            .filter_map(|ex| self.normalizer.embed_input(ex))
            .collect()
    }
}

/// SHA-256 over the ordered, serialized examples.
fn fingerprint(examples: &[Example]) -> Result<String> {
    let mut hasher = Sha256::new();
    for ex in examples {
        hasher.update(serde_json::to_vec(ex)?);
        hasher.update([b'\n']);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Load every example from `source`.
///
/// A directory is read as a folder of images (sorted by file name); any other
/// path is read as JSONL, or as a JSON array when it ends in `.json`.
pub fn load(source: impl AsRef<Path>, normalizer: Arc<dyn ExampleNormalizer>) -> Result<Collection> {
    let source = source.as_ref();
    let meta = fs::metadata(source).map_err(|_| AnnError::SourceNotFound {
        path: source.to_path_buf(),
    })?;

    let examples = if meta.is_dir() {
        read_image_dir(source)?
    } else if source.extension().is_some_and(|e| e == "json") {
        read_json_array(source)?
    } else {
        read_jsonl(source)?
    };

    tracing::info!(
        source = %source.display(),
        count = examples.len(),
        modality = ?normalizer.modality(),
        "loaded examples"
    );
    Collection::from_examples(source, examples, normalizer)
}

fn read_jsonl(path: &Path) -> Result<Vec<Example>> {
    let file = fs::File::open(path).map_err(|_| AnnError::SourceNotFound {
        path: path.to_path_buf(),
    })?;

    let mut examples = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            AnnError::Source(format!("{} line {}: {}", path.display(), lineno + 1, e))
        })?;
        let example = Example::from_value(value).ok_or_else(|| {
            AnnError::Source(format!(
                "{} line {}: expected a JSON object",
                path.display(),
                lineno + 1
            ))
        })?;
        examples.push(example);
    }
    Ok(examples)
}

fn read_json_array(path: &Path) -> Result<Vec<Example>> {
    let bytes = fs::read(path).map_err(|_| AnnError::SourceNotFound {
        path: path.to_path_buf(),
    })?;
    let values: Vec<Value> = serde_json::from_slice(&bytes)
        .map_err(|e| AnnError::Source(format!("{}: {}", path.display(), e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            Example::from_value(v).ok_or_else(|| {
                AnnError::Source(format!("{} item {}: expected a JSON object", path.display(), i))
            })
        })
        .collect()
}

fn read_image_dir(dir: &Path) -> Result<Vec<Example>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|p| {
            let path = p.to_string_lossy().to_string();
            let file = p.file_name()?.to_string_lossy().to_string();
            let stem = p.file_stem()?.to_string_lossy().to_string();
            Example::from_value(json!({
                "image": path,
                "path": path,
                "text": stem,
                "meta": { "file": file },
            }))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_jsonl(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_load_jsonl_keeps_order_and_hashes() {
        let dir = TempDir::new().unwrap();
        let path = write_jsonl(
            &dir,
            "a.jsonl",
            &[r#"{"text": "first"}"#, "", r#"{"text": "second", "meta": {"id": 2}}"#],
        );

        let collection = load(&path, Modality::Text.normalizer()).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(0).unwrap().get_str("text"), Some("first"));
        assert_eq!(collection.get(1).unwrap().get_str("text"), Some("second"));
        assert!(collection.iter().all(|ex| ex.input_hash().is_some()));
        assert_eq!(collection.embed_inputs(0..2), vec!["first", "second"]);
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path().join("missing.jsonl"), Modality::Text.normalizer()).unwrap_err();
        assert!(matches!(err, AnnError::SourceNotFound { .. }));
    }

    #[test]
    fn test_empty_source() {
        let dir = TempDir::new().unwrap();
        let path = write_jsonl(&dir, "empty.jsonl", &["", "  "]);
        let err = load(&path, Modality::Text.normalizer()).unwrap_err();
        assert!(matches!(err, AnnError::EmptyCollection { .. }));
    }

    #[test]
    fn test_malformed_line_names_line_number() {
        let dir = TempDir::new().unwrap();
        let path = write_jsonl(&dir, "bad.jsonl", &[r#"{"text": "ok"}"#, "{oops"]);
        let err = load(&path, Modality::Text.normalizer()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_text_example_without_text_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_jsonl(&dir, "a.jsonl", &[r#"{"text": "ok"}"#, r#"{"title": "no text"}"#]);
        let err = load(&path, Modality::Text.normalizer()).unwrap_err();
        assert!(matches!(err, AnnError::Source(_)));
    }

    #[test]
    fn test_fingerprint_tracks_order() {
        let a = Collection::from_examples(
            "mem",
            vec![Example::text("a"), Example::text("b")],
            Modality::Text.normalizer(),
        )
        .unwrap();
        let b = Collection::from_examples(
            "mem",
            vec![Example::text("b"), Example::text("a")],
            Modality::Text.normalizer(),
        )
        .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_load_image_dir() {
        let dir = TempDir::new().unwrap();
        for name in ["b-laptop.png", "a-cat.JPG", "notes.txt"] {
            fs::write(dir.path().join(name), b"fake").unwrap();
        }

        let collection = load(dir.path(), Modality::Image.normalizer()).unwrap();
        assert_eq!(collection.len(), 2);
        let first = collection.get(0).unwrap();
        assert_eq!(first.get_str("text"), Some("a-cat"));
        assert_eq!(first.meta_str("file"), Some("a-cat.JPG"));
        assert!(collection.embed_inputs(0..2)[1].ends_with("b-laptop.png"));
    }

    #[test]
    fn test_load_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, r#"[{"text": "x"}, {"text": "y"}]"#).unwrap();
        let collection = load(&path, Modality::Text.normalizer()).unwrap();
        assert_eq!(collection.len(), 2);
    }
}
