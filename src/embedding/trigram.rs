//! Offline embedding provider built from hashed word and character-trigram
//! features.
//!
//! It has no notion of meaning, only of shared spelling, but it is
//! deterministic and needs no model download, which makes it the default for
//! local runs and tests.

use std::collections::BTreeMap;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

pub const MODEL_NAME: &str = "trigram-v1";

const STOP_WORDS: [&str; 33] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "we",
];

#[derive(Debug, Clone)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let h = bytes
            .iter()
            .fold(0xcbf29ce484222325u64, |acc, &b| (acc ^ b as u64).wrapping_mul(multiplier));
        (h % self.dimensions as u64) as usize
    }

    /// Unit-length embedding of `text`; all zeros when no usable words remain.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        // Ordered so bucket sums accumulate the same way on every call.
        let mut freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *freq.entry(word).or_insert(0) += 1;
        }

        for (word, count) in freq {
            let weight = (count as f32).sqrt();
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(trigram.as_bytes(), 0x100000001b3)] += weight;
            }
            embedding[self.bucket(word.as_bytes(), 0x5bd1e995)] += count as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, items: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(items.iter().map(|item| self.embed_text(item)).collect())
    }
}
