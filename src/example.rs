//! Annotation examples: opaque JSON objects with a content field, an optional
//! `meta` object and stable content hashes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const INPUT_HASH_KEY: &str = "_input_hash";
pub const TASK_HASH_KEY: &str = "_task_hash";

/// Fields that identify the input an annotator sees.
const INPUT_KEYS: [&str; 4] = ["text", "image", "html", "input"];
/// Fields that, on top of the input, identify the annotation task.
const TASK_KEYS: [&str; 3] = ["spans", "label", "options"];

/// One annotation example.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Example(Map<String, Value>);

impl Example {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut ex = Self::new();
        ex.insert("text", Value::String(text.into()));
        ex
    }

    /// Wrap a JSON value. Only objects are examples.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.0.get("meta").and_then(Value::as_object)
    }

    /// Set `meta.<key>`, creating (or replacing a non-object) `meta` as needed.
    pub fn set_meta(&mut self, key: &str, value: Value) {
        let meta = self
            .0
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Value::Object(map) = meta {
            map.insert(key.to_string(), value);
        }
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta().and_then(|m| m.get(key)).and_then(Value::as_str)
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta().and_then(|m| m.get(key)).and_then(Value::as_f64)
    }

    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.meta().and_then(|m| m.get(key)).and_then(Value::as_u64)
    }

    pub fn input_hash(&self) -> Option<i64> {
        self.0.get(INPUT_HASH_KEY).and_then(Value::as_i64)
    }

    pub fn task_hash(&self) -> Option<i64> {
        self.0.get(TASK_HASH_KEY).and_then(Value::as_i64)
    }

    /// Assign `_input_hash` and `_task_hash` unless already present.
    /// Hashes are never recomputed once set.
    pub fn set_hashes(&mut self) {
        let input_hash = match self.input_hash() {
            Some(h) => h,
            None => {
                let h = hash_fields(&self.0, &INPUT_KEYS, None);
                self.0.insert(INPUT_HASH_KEY.to_string(), Value::from(h));
                h
            }
        };
        if self.task_hash().is_none() {
            let h = hash_fields(&self.0, &TASK_KEYS, Some(input_hash));
            self.0.insert(TASK_HASH_KEY.to_string(), Value::from(h));
        }
    }

}

/// Signed 32-bit hash over the given fields (in key order), seeded by `seed`.
fn hash_fields(map: &Map<String, Value>, keys: &[&str], seed: Option<i64>) -> i64 {
    let mut hasher = Sha256::new();
    if let Some(seed) = seed {
        hasher.update(seed.to_le_bytes());
    }
    for key in keys {
        if let Some(value) = map.get(*key) {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0u8]);
        }
    }
    let digest = hasher.finalize();
    i32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as i64
}

/// Drop an `image` field that holds an inline `data:` URI, then make sure the
/// example carries hashes. Keeps base64 payloads out of saved datasets.
pub fn strip_base64(mut example: Example) -> Example {
    if example
        .get_str("image")
        .is_some_and(|img| img.starts_with("data:"))
    {
        example.remove("image");
    }
    example.set_hashes();
    example
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hashes_depend_on_content_only() {
        let mut a = Example::text("hello world");
        let mut b = Example::text("hello world");
        b.set_meta("source", json!("elsewhere"));
        a.set_hashes();
        b.set_hashes();
        assert_eq!(a.input_hash(), b.input_hash());
        assert_eq!(a.task_hash(), b.task_hash());

        let mut c = Example::text("goodbye world");
        c.set_hashes();
        assert_ne!(a.input_hash(), c.input_hash());
    }

    #[test]
    fn test_task_hash_includes_label() {
        let mut a = Example::text("hello");
        let mut b = Example::text("hello");
        b.insert("label", json!("GREETING"));
        a.set_hashes();
        b.set_hashes();
        assert_eq!(a.input_hash(), b.input_hash());
        assert_ne!(a.task_hash(), b.task_hash());
    }

    #[test]
    fn test_existing_hashes_are_kept() {
        let mut ex = Example::from_value(json!({"text": "x", "_input_hash": 7, "_task_hash": 8})).unwrap();
        ex.set_hashes();
        assert_eq!(ex.input_hash(), Some(7));
        assert_eq!(ex.task_hash(), Some(8));
    }

    #[test]
    fn test_set_meta_creates_object() {
        let mut ex = Example::from_value(json!({"text": "x", "meta": "not an object"})).unwrap();
        ex.set_meta("distance", json!(0.25));
        ex.set_meta("query", json!("q"));
        assert_eq!(ex.meta_f64("distance"), Some(0.25));
        assert_eq!(ex.meta_str("query"), Some("q"));
    }

    #[test]
    fn test_strip_base64() {
        let ex = Example::from_value(json!({"image": "data:image/png;base64,AAAA", "path": "a.png"})).unwrap();
        let stripped = strip_base64(ex);
        assert!(stripped.get("image").is_none());
        assert_eq!(stripped.get_str("path"), Some("a.png"));
        assert!(stripped.input_hash().is_some());

        let kept = strip_base64(Example::from_value(json!({"image": "photos/a.png"})).unwrap());
        assert_eq!(kept.get_str("image"), Some("photos/a.png"));
    }

    #[test]
    fn test_non_object_is_not_an_example() {
        assert!(Example::from_value(json!([1, 2])).is_none());
        assert!(Example::from_value(json!("text")).is_none());
    }
}
