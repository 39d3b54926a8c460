//! Logging setup.
//!
//! Console output stays human-oriented (status lines, prompts); the tracing
//! log goes to a daily-rolling file in the system temp directory so failed
//! runs can be diagnosed after the fact. `RUST_LOG` overrides the level.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log directory path (defaults to the system temp directory)
    pub log_dir: PathBuf,
    /// Default level when RUST_LOG is unset
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            level: Level::INFO,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Debug flag from the CLI flips the default level.
    pub fn with_debug(self, debug: bool) -> Self {
        if debug {
            self.with_level(Level::DEBUG)
        } else {
            self
        }
    }
}

/// Initialize the tracing subscriber with a rolling file appender.
///
/// Returns the appender guard; hold it for the lifetime of the program or
/// buffered log lines are lost on exit.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir).with_context(|| {
        format!("Failed to create log directory: {}", config.log_dir.display())
    })?;

    let appender = RollingFileAppender::new(
        Rotation::DAILY,
        &config.log_dir,
        format!("{}.log", program_name),
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .ok();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .with_log_dir("/tmp/vid-upscale-test")
            .with_debug(true);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/vid-upscale-test"));
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_debug_flag_off_keeps_default() {
        let config = LogConfig::new().with_debug(false);
        assert_eq!(config.level, Level::INFO);
    }
}
