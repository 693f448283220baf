use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::Level;

use crate::timestamp;
use crate::{Error, Result};

/// Configuration for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable console logging
    #[serde(default)]
    pub console: bool,
    /// Filter directive for the subscriber (e.g., "info", "warn,my_app=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Console format ("text" or "json")
    #[serde(default = "default_format")]
    pub format: String,
    /// Show target/module on the console
    #[serde(default)]
    pub target: bool,
    /// Rotating file logging configuration
    pub file: Option<FileLogConfig>,
}

impl LogConfig {
    /// Create a new LogConfig with defaults
    pub fn new() -> Self {
        Self {
            console: false,
            level: default_log_level(),
            format: default_format(),
            target: false,
            file: None,
        }
    }

    /// Enable console logging
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: String) -> Self {
        self.level = level;
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    /// Show target/module on the console
    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }

    /// Set file logging configuration
    pub fn with_file(mut self, file: FileLogConfig) -> Self {
        self.file = Some(file);
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_error_level() -> String {
    "error".to_string()
}

fn default_check_interval() -> u64 {
    3600
}

/// Configuration for the rotating main/error file pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLogConfig {
    /// Directory of the main stream
    pub directory: PathBuf,
    /// Directory of the error stream; `<directory>/errors` when unset
    #[serde(default)]
    pub error_directory: Option<PathBuf>,
    /// Offset deciding day boundaries: "UTC" (default), "local" or "+HH:MM"
    ///
    /// "local" is read once when the manager is created. Platforms that
    /// refuse the lookup, such as Linux once the process runs more than one
    /// thread, get UTC and a warning instead; set a fixed offset there.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Days a rotated file stays on disk before it is archived
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Lowest level written to the main stream
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Lowest level written to the error stream
    #[serde(default = "default_error_level")]
    pub error_level: String,
    /// Seconds between background rotation checks; 0 disables them
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl FileLogConfig {
    /// Create a new FileLogConfig
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            error_directory: None,
            timezone: default_timezone(),
            retention_days: default_retention_days(),
            level: default_log_level(),
            error_level: default_error_level(),
            check_interval_secs: default_check_interval(),
        }
    }

    /// Set the error stream directory
    pub fn with_error_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.error_directory = Some(directory.into());
        self
    }

    /// Set the timezone
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Set the retention threshold in days
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Set the main stream level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the error stream level
    pub fn with_error_level(mut self, level: impl Into<String>) -> Self {
        self.error_level = level.into();
        self
    }

    /// Set the background rotation check interval
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    /// Effective error directory
    pub fn error_directory(&self) -> PathBuf {
        self.error_directory
            .clone()
            .unwrap_or_else(|| self.directory.join("errors"))
    }

    /// Resolved UTC offset
    pub fn offset(&self) -> Result<UtcOffset> {
        timestamp::resolve_offset(&self.timezone)
    }

    /// Parsed main stream level
    pub fn main_level(&self) -> Result<Level> {
        parse_level(&self.level)
    }

    /// Parsed error stream level
    pub fn error_stream_level(&self) -> Result<Level> {
        parse_level(&self.error_level)
    }

    /// Check settings that would otherwise fail later
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Config("log directory is empty".to_string()));
        }
        if self.error_directory() == self.directory {
            return Err(Error::Config(
                "error directory must differ from the main directory".to_string(),
            ));
        }
        self.offset()?;
        self.main_level()?;
        self.error_stream_level()?;
        Ok(())
    }
}

fn parse_level(level: &str) -> Result<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| Error::Config(format!("invalid level: {}", level)))
}
