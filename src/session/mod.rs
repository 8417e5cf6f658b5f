//! Live annotation sessions and the query-driven reset protocol.

pub mod adapter;
pub mod controller;
pub mod stream;

pub use adapter::{AdapterState, ResetEvent, StreamSessionAdapter};
pub use controller::{Controller, SessionHost};
pub use stream::{Stream, Transform, ViewerId};

use std::sync::Arc;

use crate::example::strip_base64;

/// Transform that drops inline `data:` media before delivery.
pub fn remove_base64() -> Transform {
    Arc::new(strip_base64)
}
