use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::Level;

const RECORD_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
);

/// Renders one record as text, given the configured offset.
pub type FormatRecord = fn(&Record, UtcOffset) -> String;

/// A single log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Severity.
    pub level: Level,
    /// Rendered message.
    pub message: String,
    /// Logical origin, usually a module path.
    pub target: String,
    /// Source file, when known.
    pub file: Option<String>,
    /// Source line, when known.
    pub line: Option<u32>,
    /// Exception or error chain text appended after the line.
    pub exception: Option<String>,
    /// Stack text appended after the exception.
    pub stack: Option<String>,
    /// When the event happened.
    pub time: OffsetDateTime,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            target: String::new(),
            file: None,
            line: None,
            exception: None,
            stack: None,
            time: OffsetDateTime::now_utc(),
        }
    }

    /// Set the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the source location.
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Attach exception text.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Attach stack text.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Override the event time.
    pub fn at(mut self, time: OffsetDateTime) -> Self {
        self.time = time;
        self
    }
}

/// Default formatter.
///
/// `2024-01-03 09:15:00.123     INFO message\t\t| target at 'file:line'`,
/// then exception and stack text on the following lines. The result always
/// ends with a newline.
pub fn format_record(record: &Record, offset: UtcOffset) -> String {
    // A shift past the supported date range keeps the record's own offset.
    // Every in-range instant has each component the description asks for, so
    // formatting only fails on inputs the shift already rejected.
    let shifted = record.time.checked_to_offset(offset).unwrap_or(record.time);
    let time = shifted
        .format(RECORD_TIME_FORMAT)
        .unwrap_or_else(|_| shifted.to_string());
    let file = record.file.as_deref().unwrap_or("<unknown>");
    let line = record.line.unwrap_or(0);

    let mut out = format!(
        "{} {:>8} {}\t\t| {} at '{}:{}'",
        time,
        record.level.as_str(),
        record.message,
        record.target,
        file,
        line
    );

    for extra in [&record.exception, &record.stack].into_iter().flatten() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(extra);
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
