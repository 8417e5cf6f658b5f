//! The live stream of one annotation session: a pending queue shared by all
//! viewers, a delivery cursor per viewer and the transformation chain every
//! example passes through on its way out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::example::Example;

/// A step applied to each example at delivery time.
pub type Transform = Arc<dyn Fn(Example) -> Example + Send + Sync>;

pub type ViewerId = String;

#[derive(Clone)]
struct NamedTransform {
    name: String,
    apply: Transform,
}

pub struct Stream {
    queue: Vec<Example>,
    cursors: HashMap<ViewerId, usize>,
    transforms: Vec<NamedTransform>,
    generation: u64,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("queue_len", &self.queue.len())
            .field("cursors", &self.cursors)
            .field("transforms", &self.transform_names())
            .field("generation", &self.generation)
            .finish()
    }
}

impl Stream {
    pub fn from_examples(queue: Vec<Example>) -> Self {
        Self {
            queue,
            cursors: HashMap::new(),
            transforms: Vec::new(),
            generation: 0,
        }
    }

    /// Append a step to the end of the transformation chain.
    pub fn apply(&mut self, name: impl Into<String>, transform: Transform) {
        self.transforms.push(NamedTransform {
            name: name.into(),
            apply: transform,
        });
    }

    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name.as_str()).collect()
    }

    /// Attach a viewer at the start of the queue; no-op if already attached.
    pub fn ensure_viewer(&mut self, viewer: &str) {
        if !self.cursors.contains_key(viewer) {
            self.cursors.insert(viewer.to_string(), 0);
        }
    }

    /// Attached viewers, sorted.
    pub fn viewers(&self) -> Vec<ViewerId> {
        let mut viewers: Vec<ViewerId> = self.cursors.keys().cloned().collect();
        viewers.sort();
        viewers
    }

    /// Deliver the next example to `viewer`, attaching it if needed.
    pub fn next_for(&mut self, viewer: &str) -> Option<Example> {
        self.ensure_viewer(viewer);
        let cursor = self.cursors.get_mut(viewer)?;
        let example = self.queue.get(*cursor)?.clone();
        *cursor += 1;
        Some(self.run_chain(example))
    }

    /// First example of the queue with the chain applied, without moving any cursor.
    pub fn peek_first(&self) -> Option<Example> {
        self.queue.first().cloned().map(|ex| self.run_chain(ex))
    }

    /// Examples `viewer` has not been delivered yet.
    pub fn remaining(&self, viewer: &str) -> usize {
        let cursor = self.cursors.get(viewer).copied().unwrap_or(0);
        self.queue.len().saturating_sub(cursor)
    }

    /// Swap in a new queue. Every attached viewer is rewound to its start.
    /// The chain is kept when `preserve_transforms` is set, dropped otherwise.
    pub fn replace_queue(&mut self, queue: Vec<Example>, preserve_transforms: bool) {
        if !preserve_transforms {
            self.transforms.clear();
        }
        self.queue = queue;
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
        self.generation += 1;
    }

    /// Number of queue replacements so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn run_chain(&self, example: Example) -> Example {
        self.transforms
            .iter()
            .fold(example, |ex, t| (t.apply)(ex))
    }
}
