use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use time::UtcOffset;
use tracing::Level;

use crate::format::{FormatRecord, Record};
use crate::rotation::{LogLayout, Stream};
use crate::{Error, Result};

/// An open active file.
#[derive(Debug)]
pub struct FileState {
    /// The open append handle.
    pub file: File,
    /// Where the handle points.
    pub path: PathBuf,
}

impl FileState {
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// Owns the append handles of both streams and writes formatted records to them.
///
/// Not synchronized: callers sharing a writer across threads wrap it in a
/// mutex (see [`crate::LoggingContext`]).
pub struct ActiveWriter {
    main: Option<FileState>,
    error: Option<FileState>,
    format: FormatRecord,
    offset: UtcOffset,
    main_level: Level,
    error_level: Level,
}

impl ActiveWriter {
    /// Create a writer with both streams closed.
    pub fn new(format: FormatRecord, offset: UtcOffset, main_level: Level, error_level: Level) -> Self {
        Self {
            main: None,
            error: None,
            format,
            offset,
            main_level,
            error_level,
        }
    }

    /// Open both active files for append, dropping any handles held before.
    pub fn open(&mut self, layout: &LogLayout) -> Result<()> {
        self.close();
        std::fs::create_dir_all(layout.directory(Stream::Main))?;
        std::fs::create_dir_all(layout.directory(Stream::Error))?;

        self.main = Some(FileState::open(&layout.active_path(Stream::Main))?);
        self.error = Some(FileState::open(&layout.active_path(Stream::Error))?);
        Ok(())
    }

    /// Flush and drop both handles.
    pub fn close(&mut self) {
        self.close_stream(Stream::Main);
        self.close_stream(Stream::Error);
    }

    /// Flush and drop one stream's handle.
    pub fn close_stream(&mut self, stream: Stream) {
        if let Some(mut state) = self.slot(stream).take()
            && let Err(e) = state.file.flush()
        {
            tracing::warn!("flushing {} failed: {}", state.path.display(), e);
        }
    }

    /// Whether `stream` currently holds a handle.
    pub fn is_open(&self, stream: Stream) -> bool {
        match stream {
            Stream::Main => self.main.is_some(),
            Stream::Error => self.error.is_some(),
        }
    }

    /// Path the stream's handle points at, if open.
    pub fn open_path(&self, stream: Stream) -> Option<&Path> {
        let state = match stream {
            Stream::Main => self.main.as_ref(),
            Stream::Error => self.error.as_ref(),
        };
        state.map(|s| s.path.as_path())
    }

    /// Append `record` to `stream`. Fails with [`Error::Closed`] when the
    /// stream has no handle; I/O errors are returned as is.
    pub fn write(&mut self, stream: Stream, record: &Record) -> Result<()> {
        let text = (self.format)(record, self.offset);
        let state = self.slot(stream).as_mut().ok_or(Error::Closed)?;
        state.file.write_all(text.as_bytes())?;
        state.file.flush()?;
        Ok(())
    }

    /// Route `record` to every stream whose level it meets.
    pub fn dispatch(&mut self, record: &Record) -> Result<()> {
        if meets(record.level, self.main_level) {
            self.write(Stream::Main, record)?;
        }
        if meets(record.level, self.error_level) {
            self.write(Stream::Error, record)?;
        }
        Ok(())
    }

    fn slot(&mut self, stream: Stream) -> &mut Option<FileState> {
        match stream {
            Stream::Main => &mut self.main,
            Stream::Error => &mut self.error,
        }
    }
}

// tracing orders levels by verbosity: ERROR < WARN < ... < TRACE.
fn meets(level: Level, threshold: Level) -> bool {
    level <= threshold
}
