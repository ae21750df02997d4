//! Tracing subscriber setup for the binary.

use crate::error::ClientError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "narrify=info,narrify_client=info,warn";

/// Install the global subscriber. `RUST_LOG` wins over `configured`.
///
/// Logs go to stderr so the shell's stdout stays clean.
pub fn init_logging(configured: Option<&str>) -> Result<(), ClientError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER)))
        .map_err(|e| ClientError::Logging(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| ClientError::Logging(format!("Failed to init subscriber: {}", e)))?;

    tracing::debug!(filter = ?configured, "Logging initialized");
    Ok(())
}
