use std::sync::Arc;

use crate::config::FileLogConfig;
use crate::format::{FormatRecord, Record, format_record};
use crate::rotation::{LogLayout, RotationEngine, RotationOutcome, Stream};
use crate::timestamp::{Clock, SystemClock};
use crate::writer::ActiveWriter;
use crate::Result;

/// Owns the writer and the rotation engine for one main/error stream pair.
///
/// Rotation is only checked at [`warm_up`](Self::warm_up) and
/// [`check_rotation`](Self::check_rotation); writes never trigger it. A
/// process that runs across midnight keeps writing to yesterday's active
/// file until someone calls `check_rotation`.
pub struct LogManager {
    engine: RotationEngine,
    writer: ActiveWriter,
}

impl LogManager {
    /// Create a manager on the wall clock. Nothing is opened until `warm_up`.
    pub fn new(config: &FileLogConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager on a custom clock.
    pub fn with_clock(config: &FileLogConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_formatter(config, clock, format_record)
    }

    /// Create a manager with a custom clock and record formatter.
    pub fn with_formatter(
        config: &FileLogConfig,
        clock: Arc<dyn Clock>,
        format: FormatRecord,
    ) -> Result<Self> {
        config.validate()?;
        let offset = config.offset()?;
        let layout = LogLayout::new(config.directory.clone(), config.error_directory());
        Ok(Self {
            engine: RotationEngine::new(layout, offset, config.retention_days, clock),
            writer: ActiveWriter::new(
                format,
                offset,
                config.main_level()?,
                config.error_stream_level()?,
            ),
        })
    }

    /// Bring the stream pair up.
    ///
    /// A missing main active file is created fresh; otherwise the existing
    /// files are opened and checked once for rotation.
    pub fn warm_up(&mut self) -> Result<RotationOutcome> {
        if !self.layout().active_path(Stream::Main).exists() {
            self.engine.initialize()?;
            self.writer.open(self.engine.layout())?;
            tracing::debug!(
                "started new log files in {}",
                self.layout().directory(Stream::Main).display()
            );
            return Ok(RotationOutcome::Current);
        }

        self.writer.open(self.engine.layout())?;
        Ok(self.engine.check(&mut self.writer))
    }

    /// Explicit rotation checkpoint.
    pub fn check_rotation(&mut self) -> RotationOutcome {
        self.engine.check(&mut self.writer)
    }

    /// Close both handles. A later `warm_up` reopens them.
    pub fn shutdown(&mut self) {
        self.writer.close();
    }

    /// Send `record` to every stream whose level it meets.
    pub fn log(&mut self, record: &Record) -> Result<()> {
        self.writer.dispatch(record)
    }

    /// Write `record` to one stream regardless of level.
    pub fn write(&mut self, stream: Stream, record: &Record) -> Result<()> {
        self.writer.write(stream, record)
    }

    /// Close one stream's handle.
    pub fn close_stream(&mut self, stream: Stream) {
        self.writer.close_stream(stream);
    }

    /// Whether `stream` is open for writing.
    pub fn is_open(&self, stream: Stream) -> bool {
        self.writer.is_open(stream)
    }

    /// Directory and file layout.
    pub fn layout(&self) -> &LogLayout {
        self.engine.layout()
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.writer.close();
    }
}
