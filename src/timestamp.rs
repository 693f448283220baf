//! Clocks, UTC offsets and the text formats of timestamps and date stamps.
//!
//! Every date decision in the crate goes through a [`Clock`] and a
//! configured [`UtcOffset`], so "today" can be pinned in tests.

use std::sync::{Mutex, PoisonError};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::{Error, Result};

/// First line of an active file.
const CREATION_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Date part of a rotated file name.
const DATE_STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]");

const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now_utc(&self) -> OffsetDateTime;

    /// Current instant shifted to `offset`.
    fn now(&self, offset: UtcOffset) -> OffsetDateTime {
        self.now_utc().to_offset(offset)
    }

    /// Calendar date at `offset`.
    fn today(&self, offset: UtcOffset) -> Date {
        self.now(offset).date()
    }
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Create a clock stopped at `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolve a timezone setting: `local`, `UTC`/`Z`, or `+HH:MM`/`-HH:MM`.
///
/// `local` falls back to UTC, with a warning, when the platform cannot
/// report the local offset (for example in a multi-threaded process on
/// Linux).
pub fn resolve_offset(setting: &str) -> Result<UtcOffset> {
    let setting = setting.trim();
    if setting.eq_ignore_ascii_case("local") {
        return Ok(UtcOffset::current_local_offset().unwrap_or_else(|e| {
            tracing::warn!("local offset unavailable ({}), using UTC", e);
            UtcOffset::UTC
        }));
    }
    if setting.eq_ignore_ascii_case("utc") || setting == "Z" {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(setting, OFFSET_FORMAT)
        .map_err(|e| Error::Config(format!("invalid timezone '{}': {}", setting, e)))
}

/// Render the creation timestamp written as an active file's first line.
pub fn format_creation(at: OffsetDateTime) -> Result<String> {
    at.format(CREATION_FORMAT)
        .map_err(|e| Error::Time(e.into()))
}

/// Parse an active file's first line back into a wall-clock timestamp.
pub fn parse_creation(line: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(line.trim(), CREATION_FORMAT)
        .map_err(|e| Error::Parse(format!("creation timestamp '{}': {}", line.trim(), e)))
}

/// Render `date` as `YYYYMMDD`.
pub fn format_date_stamp(date: Date) -> Result<String> {
    date.format(DATE_STAMP_FORMAT)
        .map_err(|e| Error::Time(e.into()))
}

/// Parse a `YYYYMMDD` stamp.
pub fn parse_date_stamp(stamp: &str) -> Result<Date> {
    Date::parse(stamp, DATE_STAMP_FORMAT)
        .map_err(|e| Error::Parse(format!("date stamp '{}': {}", stamp, e)))
}

/// `today` minus `days`, saturating at the earliest representable date.
pub fn days_before(today: Date, days: u32) -> Date {
    today
        .checked_sub(Duration::days(i64::from(days)))
        .unwrap_or(Date::MIN)
}
