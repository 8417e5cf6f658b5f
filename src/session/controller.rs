//! In-process host runtime for one session.

use std::sync::RwLock;

use crate::error::{AnnError, Result};
use crate::example::Example;
use crate::session::stream::{Stream, Transform, ViewerId};

/// What the reset protocol needs from the runtime hosting a session.
pub trait SessionHost: Send + Sync {
    /// Replace the active queue in one step: new queue in, every viewer
    /// rewound, chain kept when `preserve_transforms` is set.
    ///
    /// Returns the first example of the new queue with the chain applied. When
    /// `delivered_to` names a viewer, that example counts as delivered to it.
    fn replace_queue(
        &self,
        queue: Vec<Example>,
        preserve_transforms: bool,
        delivered_to: Option<&str>,
    ) -> Result<Option<Example>>;

    fn viewers(&self) -> Result<Vec<ViewerId>>;
}

/// Owns a session's [`Stream`] behind a single lock.
///
/// Readers and the reset path take the same write lock, so a viewer sees
/// either the old queue or the new one, never a mix.
#[derive(Debug)]
pub struct Controller {
    stream: RwLock<Stream>,
}

fn poisoned<T>(_: T) -> AnnError {
    AnnError::Session("session stream lock poisoned".to_string())
}

impl Controller {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream: RwLock::new(stream),
        }
    }

    /// Next example for `viewer`, or `None` once it has seen the whole queue.
    pub fn next(&self, viewer: &str) -> Result<Option<Example>> {
        let mut stream = self.stream.write().map_err(poisoned)?;
        Ok(stream.next_for(viewer))
    }

    /// Append a step to the transformation chain.
    pub fn add_transform(&self, name: impl Into<String>, transform: Transform) -> Result<()> {
        let mut stream = self.stream.write().map_err(poisoned)?;
        stream.apply(name, transform);
        Ok(())
    }

    pub fn transform_names(&self) -> Result<Vec<String>> {
        let stream = self.stream.read().map_err(poisoned)?;
        Ok(stream.transform_names().into_iter().map(String::from).collect())
    }

    pub fn remaining(&self, viewer: &str) -> Result<usize> {
        let stream = self.stream.read().map_err(poisoned)?;
        Ok(stream.remaining(viewer))
    }

    pub fn generation(&self) -> Result<u64> {
        let stream = self.stream.read().map_err(poisoned)?;
        Ok(stream.generation())
    }

    pub fn queue_len(&self) -> Result<usize> {
        let stream = self.stream.read().map_err(poisoned)?;
        Ok(stream.len())
    }
}

impl SessionHost for Controller {
    fn replace_queue(
        &self,
        queue: Vec<Example>,
        preserve_transforms: bool,
        delivered_to: Option<&str>,
    ) -> Result<Option<Example>> {
        let mut stream = self.stream.write().map_err(poisoned)?;
        stream.replace_queue(queue, preserve_transforms);
        let first = match delivered_to {
            Some(viewer) => stream.next_for(viewer),
            None => stream.peek_first(),
        };
        tracing::debug!(
            generation = stream.generation(),
            queue = stream.len(),
            viewers = stream.viewers().len(),
            "replaced session queue"
        );
        Ok(first)
    }

    fn viewers(&self) -> Result<Vec<ViewerId>> {
        let stream = self.stream.read().map_err(poisoned)?;
        Ok(stream.viewers())
    }
}
