use crate::infrastructure::error::InfraError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_NAME: &str = "pomoplay.log";
const DEFAULT_FILTER: &str = "info,pomoplay=debug";

/// Installs the global subscriber: human-readable lines on stdout plus the
/// same events appended to `logs/pomoplay.log` without ANSI colours.
pub fn init_logging(logs_dir: &Path) -> Result<PathBuf, InfraError> {
    let log_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .try_init()
        .map_err(|error| {
            InfraError::InvalidConfig(format!("logging already initialized: {error}"))
        })?;

    Ok(log_path)
}
