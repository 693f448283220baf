//! Daily rotation of the active files.
//!
//! The main active file records its creation time on its first line. When
//! that date falls before today (in the configured offset) the main and
//! error active files are renamed to dated files as a pair, a fresh main
//! active file is stamped, and both directories are handed to the archiver.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use time::{Date, UtcOffset};

use crate::archive;
use crate::timestamp::{self, Clock};
use crate::writer::ActiveWriter;
use crate::{Error, Result};

/// Reserved name of the main active file.
pub const ACTIVE_MAIN: &str = ".latest.log";
/// Reserved name of the error active file.
pub const ACTIVE_ERROR: &str = ".latest_error.log";
/// Archive kept in the main directory.
pub const MAIN_ARCHIVE: &str = "archived_logs.zip";
/// Archive kept in the error directory.
pub const ERROR_ARCHIVE: &str = "archived_errors.zip";
/// Suffix distinguishing rotated error files.
pub const ERROR_SUFFIX: &str = "_error";

/// One of the two log channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Every record at or above the main level.
    Main,
    /// Records at or above the error level.
    Error,
}

impl Stream {
    /// Both streams, main first.
    pub const ALL: [Stream; 2] = [Stream::Main, Stream::Error];
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Main => f.write_str("main"),
            Stream::Error => f.write_str("error"),
        }
    }
}

/// Where each stream's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    main_dir: PathBuf,
    error_dir: PathBuf,
}

impl LogLayout {
    /// Create a layout from the two stream directories.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(main_dir: P, error_dir: Q) -> Self {
        Self {
            main_dir: main_dir.into(),
            error_dir: error_dir.into(),
        }
    }

    /// Directory of `stream`.
    pub fn directory(&self, stream: Stream) -> &Path {
        match stream {
            Stream::Main => &self.main_dir,
            Stream::Error => &self.error_dir,
        }
    }

    /// Path of the active file of `stream`.
    pub fn active_path(&self, stream: Stream) -> PathBuf {
        match stream {
            Stream::Main => self.main_dir.join(ACTIVE_MAIN),
            Stream::Error => self.error_dir.join(ACTIVE_ERROR),
        }
    }

    /// Path of the archive of `stream`.
    pub fn archive_path(&self, stream: Stream) -> PathBuf {
        match stream {
            Stream::Main => self.main_dir.join(MAIN_ARCHIVE),
            Stream::Error => self.error_dir.join(ERROR_ARCHIVE),
        }
    }

    /// Path the active file of `stream` is renamed to when it was created on `date`.
    pub fn rotated_path(&self, stream: Stream, date: Date) -> Result<PathBuf> {
        let stamp = timestamp::format_date_stamp(date)?;
        Ok(match stream {
            Stream::Main => self.main_dir.join(format!("{}.log", stamp)),
            Stream::Error => self.error_dir.join(format!("{}{}.log", stamp, ERROR_SUFFIX)),
        })
    }
}

/// Age of the active file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// No main active file exists yet.
    Missing,
    /// Created today.
    Fresh(Date),
    /// Created on an earlier day.
    Stale(Date),
}

/// Result of one rotation check.
#[derive(Debug)]
pub enum RotationOutcome {
    /// The active files already belong to today; nothing was touched.
    Current,
    /// The pair created on `previous` was rotated; `archived` dated files were
    /// moved into archives afterwards.
    Rotated { previous: Date, archived: usize },
    /// The check gave up and left the files as they were.
    Aborted(Error),
}

/// Decides whether the active files are stale and rotates them.
pub struct RotationEngine {
    layout: LogLayout,
    offset: UtcOffset,
    retention_days: u32,
    clock: Arc<dyn Clock>,
    rename: fn(&Path, &Path) -> io::Result<()>,
}

impl RotationEngine {
    /// Create an engine over `layout`.
    pub fn new(layout: LogLayout, offset: UtcOffset, retention_days: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            layout,
            offset,
            retention_days,
            clock,
            rename: rename_file,
        }
    }

    /// Replace the function used to move files during rotation.
    #[cfg(test)]
    fn with_rename(mut self, rename: fn(&Path, &Path) -> io::Result<()>) -> Self {
        self.rename = rename;
        self
    }

    /// The managed layout.
    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> Date {
        self.clock.today(self.offset)
    }

    /// Classify the main active file by the date on its first line.
    pub fn inspect(&self) -> Result<RotationState> {
        let path = self.layout.active_path(Stream::Main);
        if !path.exists() {
            return Ok(RotationState::Missing);
        }

        let mut first_line = String::new();
        BufReader::new(fs::File::open(&path)?).read_line(&mut first_line)?;
        let created = timestamp::parse_creation(&first_line)?.date();

        if created < self.today() {
            Ok(RotationState::Stale(created))
        } else {
            Ok(RotationState::Fresh(created))
        }
    }

    /// Create the main directory and a main active file stamped with now.
    ///
    /// Fails rather than overwrite an active file that already exists.
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.layout.directory(Stream::Main))?;
        self.stamp_active_file()
    }

    /// Run one rotation check, rotating the pair if it is stale.
    ///
    /// Problems are logged and returned as [`RotationOutcome::Aborted`]. Once
    /// a rotation has started, the writer's handles are reopened whether it
    /// succeeded or not.
    pub fn check(&self, writer: &mut ActiveWriter) -> RotationOutcome {
        for stream in Stream::ALL {
            let path = self.layout.active_path(stream);
            if !path.exists() {
                tracing::warn!("rotation skipped: {} active file {} not found", stream, path.display());
                return RotationOutcome::Aborted(Error::MissingFile(path));
            }
        }

        let previous = match self.inspect() {
            Ok(RotationState::Stale(date)) => date,
            Ok(RotationState::Fresh(_)) => return RotationOutcome::Current,
            Ok(RotationState::Missing) => {
                return RotationOutcome::Aborted(Error::MissingFile(
                    self.layout.active_path(Stream::Main),
                ));
            }
            Err(e) => {
                tracing::warn!("rotation skipped: {}", e);
                return RotationOutcome::Aborted(e);
            }
        };

        tracing::info!("rotating log files created on {}", previous);
        let rotated = self.rotate(writer, previous);

        if let Err(e) = writer.open(&self.layout) {
            tracing::error!("reopening active log files failed: {}", e);
            return RotationOutcome::Aborted(e);
        }

        match rotated {
            Ok(archived) => RotationOutcome::Rotated { previous, archived },
            Err(e) => {
                tracing::error!("rotation of {} aborted: {}", previous, e);
                RotationOutcome::Aborted(e)
            }
        }
    }

    /// Archive both directories. Failures are reported and skipped so one
    /// broken archive does not block the other.
    pub fn archive_all(&self) -> usize {
        let today = self.today();
        let mut archived = 0;
        for stream in Stream::ALL {
            let directory = self.layout.directory(stream);
            let archive_path = self.layout.archive_path(stream);
            match archive::archive(directory, &archive_path, self.retention_days, today) {
                Ok(report) => archived += report.added.len() + report.duplicates.len(),
                Err(e) => tracing::error!("archiving {} failed: {}", directory.display(), e),
            }
        }
        archived
    }

    fn rotate(&self, writer: &mut ActiveWriter, previous: Date) -> Result<usize> {
        let main_active = self.layout.active_path(Stream::Main);
        let error_active = self.layout.active_path(Stream::Error);
        let main_rotated = self.layout.rotated_path(Stream::Main, previous)?;
        let error_rotated = self.layout.rotated_path(Stream::Error, previous)?;

        for target in [&main_rotated, &error_rotated] {
            if target.exists() {
                return Err(Error::Rotation(format!(
                    "{} already exists",
                    target.display()
                )));
            }
        }

        writer.close();

        (self.rename)(&main_active, &main_rotated)?;
        if let Err(e) = (self.rename)(&error_active, &error_rotated) {
            self.undo_rename(&main_rotated, &main_active);
            return Err(e.into());
        }

        if let Err(e) = self.stamp_active_file() {
            self.undo_rename(&error_rotated, &error_active);
            self.undo_rename(&main_rotated, &main_active);
            return Err(e);
        }

        Ok(self.archive_all())
    }

    fn stamp_active_file(&self) -> Result<()> {
        let stamp = timestamp::format_creation(self.clock.now(self.offset))?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.layout.active_path(Stream::Main))?;
        writeln!(file, "{}", stamp)?;
        file.sync_all()?;
        Ok(())
    }

    fn undo_rename(&self, from: &Path, to: &Path) {
        if let Err(e) = (self.rename)(from, to) {
            tracing::error!(
                "restoring {} to {} failed: {}",
                from.display(),
                to.display(),
                e
            );
        }
    }
}

fn rename_file(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}
