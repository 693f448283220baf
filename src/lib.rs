//! # Daylog
//!
//! Daily log-file rotation with a rolling compressed archive.
//!
//! ## Features
//!
//! - Two streams: every record to `.latest.log`, errors to `.latest_error.log`
//! - The active file's first line records its creation time; once that date
//!   is in the past the pair is renamed to `YYYYMMDD.log` / `YYYYMMDD_error.log`
//! - Rotated files older than the retention threshold are merged into
//!   `archived_logs.zip` / `archived_errors.zip` and then deleted
//! - Integration with the `tracing` ecosystem
//!
//! ## Example
//!
//! ```rust,no_run
//! use daylog::{FileLogConfig, LoggingContext, Record};
//! use tracing::Level;
//!
//! let config = FileLogConfig::new("logs").with_timezone("+08:00");
//! let context = LoggingContext::new(&config)?;
//!
//! context.log(&Record::new(Level::INFO, "service started"))?;
//! context.check_rotation()?;
//! context.shutdown()?;
//! # Ok::<(), daylog::Error>(())
//! ```

pub mod archive;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod rotation;
pub mod timestamp;
pub mod tracing_init;
pub mod writer;

pub use archive::ArchiveReport;
pub use builder::{LogBuilder, builder};
pub use config::{FileLogConfig, LogConfig};
pub use context::{LogSink, LoggingContext, RotationChecker};
pub use error::{Error, Result};
pub use format::{FormatRecord, Record, format_record};
pub use lifecycle::LogManager;
pub use rotation::{LogLayout, RotationEngine, RotationOutcome, RotationState, Stream};
pub use timestamp::{Clock, ManualClock, SystemClock};
pub use tracing_init::{FileLayer, init_logging, stop_rotation_checker};
pub use writer::ActiveWriter;
