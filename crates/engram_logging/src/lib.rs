//! Shared logging utilities for Engram binaries.
//!
//! The tool server speaks JSON-RPC on stdout, so log output goes to a file
//! under the Engram home directory plus stderr, never stdout.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "engram=info,engram_db=info,engram_search=info,engram_mcp=info";

/// Logging configuration shared by Engram binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the full filter to stderr instead of warnings only.
    pub verbose: bool,
}

/// Initialize tracing with a file writer and a stderr layer.
///
/// The filter comes from `ENGRAM_LOG` when set, otherwise the default.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let log_path = log_dir.join(format!("{}.log", config.app_name));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let file_filter = EnvFilter::try_from_env("ENGRAM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::try_from_env("ENGRAM_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// The Engram home directory: `$ENGRAM_HOME` or `~/.engram`.
pub fn engram_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("ENGRAM_HOME") {
        return PathBuf::from(override_path);
    }
    let home = std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    home.join(".engram")
}

fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = engram_home().join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_honours_override() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("ENGRAM_HOME", tmp.path());
        assert_eq!(engram_home(), tmp.path());
        std::env::remove_var("ENGRAM_HOME");
    }
}
