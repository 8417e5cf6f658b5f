//! Tracing subscriber setup.
//!
//! Logs go to stderr; stdout is reserved for data output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AnnError, Result};

/// Install the global subscriber.
///
/// `log_level` takes an `EnvFilter` directive such as `"debug"` or
/// `"ann_stream=debug,info"`; without it `RUST_LOG` is used, then `info`.
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> Result<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AnnError::Config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && std::env::var("NO_COLOR").is_err());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AnnError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}
