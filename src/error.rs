use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur while writing, rotating or archiving logs
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Initialization failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// A timestamp or date stamp could not be formatted.
    #[error("Time error: {0}")]
    Time(#[from] time::error::Error),
    /// A creation timestamp or a rotated file name could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
    /// An active file expected by a rotation check does not exist.
    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),
    /// A rotation step refused to run.
    #[error("Rotation error: {0}")]
    Rotation(String),
    /// Reading or writing the zip archive failed.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// The stream handle is not open.
    #[error("Log stream is closed")]
    Closed,
    /// Another thread panicked while holding the logger state.
    #[error("Logger state lock poisoned")]
    Poisoned,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
