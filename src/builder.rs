//! Builder pattern for initializing logging configuration.
//!
//! This module provides a convenient builder API for configuring and initializing
//! logging in a single chain of method calls.
//!
//! # Example
//!
//! ```rust,no_run
//! // Console plus daily-rotated files under ./logs, archived after two weeks
//! let context = daylog::builder()
//!     .with_console(true)
//!     .with_level("info")
//!     .with_directory("logs")
//!     .with_timezone("+08:00")
//!     .with_retention_days(14)
//!     .init()
//!     .expect("Failed to initialize logging");
//!
//! tracing::info!("service started");
//!
//! if let Some(context) = context {
//!     context.shutdown().expect("Failed to close log files");
//! }
//! ```

use std::path::PathBuf;

use crate::init_logging;
use crate::{FileLogConfig, LogConfig, LoggingContext, Result};

/// A builder for configuring and initializing logging.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    config: LogConfig,
}

impl LogBuilder {
    /// Create a new LogBuilder with default configuration.
    pub fn new() -> Self {
        Self {
            config: LogConfig::new(),
        }
    }

    /// Create a LogBuilder from an existing configuration.
    pub fn from_config(config: LogConfig) -> Self {
        Self { config }
    }

    /// Enable or disable console logging.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config = self.config.with_console(enabled);
        self
    }

    /// Set the filter directive (e.g., "trace", "debug", "info", "warn", "error").
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config = self.config.with_level(level.into());
        self
    }

    /// Set the console output format ("text" or "json").
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.config = self.config.with_format(format.into());
        self
    }

    /// Show target/module on the console.
    pub fn with_target(mut self, target: bool) -> Self {
        self.config = self.config.with_target(target);
        self
    }

    /// Enable rotating file logging in `directory` with default settings.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_file(FileLogConfig::new(directory));
        self
    }

    /// Configure file logging with a custom FileLogConfig.
    pub fn with_file_config(mut self, file_config: FileLogConfig) -> Self {
        self.config = self.config.with_file(file_config);
        self
    }

    /// Set the error stream directory.
    ///
    /// Creates a file configuration rooted at "logs" when none is set yet.
    pub fn with_error_directory(self, directory: impl Into<PathBuf>) -> Self {
        self.map_file(|file| file.with_error_directory(directory))
    }

    /// Set the timezone deciding day boundaries.
    pub fn with_timezone(self, timezone: impl Into<String>) -> Self {
        self.map_file(|file| file.with_timezone(timezone))
    }

    /// Set the retention threshold in days.
    pub fn with_retention_days(self, days: u32) -> Self {
        self.map_file(|file| file.with_retention_days(days))
    }

    /// Set the interval of background rotation checks; 0 disables them.
    pub fn with_check_interval_secs(self, secs: u64) -> Self {
        self.map_file(|file| file.with_check_interval_secs(secs))
    }

    /// Get the current configuration without initializing.
    pub fn build(self) -> LogConfig {
        self.config
    }

    /// Initialize logging with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tracing subscriber is already initialized
    /// - The log files cannot be created or opened
    /// - Invalid configuration is provided
    pub fn init(self) -> Result<Option<LoggingContext>> {
        init_logging(&self.config, None)
    }

    fn map_file(mut self, f: impl FnOnce(FileLogConfig) -> FileLogConfig) -> Self {
        let file = self
            .config
            .file
            .take()
            .unwrap_or_else(|| FileLogConfig::new("logs"));
        self.config.file = Some(f(file));
        self
    }
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a [`LogBuilder`].
pub fn builder() -> LogBuilder {
    LogBuilder::new()
}
