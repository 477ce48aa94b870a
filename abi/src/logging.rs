//! Tracing subscriber setup for processes that load the library.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_ENV: &str = "TETHER_LOG";

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn open_log_file(path: &Path) -> Result<fs::File, String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create log dir {}: {e}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))
}

/// Install the global subscriber.
///
/// Writes to `log_file` when given and openable, otherwise to stderr.
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str, log_file: Option<&Path>) -> bool {
    let filter = env_filter(default_directive);

    let (file, warning) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(warning)) => (None, Some(warning)),
        None => (None, None),
    };

    let installed = if let Some(file) = file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
            .is_ok()
    };

    if installed {
        if let Some(path) = log_file {
            tracing::debug!(path = %path.display(), "Logging initialized");
        }
        if let Some(warning) = warning {
            tracing::warn!("{warning}");
        }
    }
    installed
}
