use std::fs;
use std::path::Path;
use std::sync::Arc;

use daylog::archive::{self, entry_names, read_entry};
use daylog::{FileLogConfig, LogManager, LoggingContext, ManualClock, Record, RotationOutcome, Stream};
use time::macros::{date, datetime};
use tracing::Level;

fn config(root: &Path) -> FileLogConfig {
    FileLogConfig::new(root.join("logs"))
        .with_timezone("UTC")
        .with_retention_days(30)
}

fn seed_active(root: &Path, first_line: &str) {
    fs::create_dir_all(root.join("logs/errors")).unwrap();
    fs::write(root.join("logs/.latest.log"), format!("{}\nyesterday's line\n", first_line)).unwrap();
    fs::write(root.join("logs/errors/.latest_error.log"), "yesterday's error\n").unwrap();
}

#[test]
fn stale_active_file_rotates_without_archiving_recent_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_active(dir.path(), "2024-01-01 10:00:00");
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-03 06:45:12 UTC)));

    let ctx = LoggingContext::with_clock(&config(dir.path()), clock).unwrap();
    ctx.log(&Record::new(Level::INFO, "first of the day")).unwrap();

    let logs = dir.path().join("logs");
    let rotated = fs::read_to_string(logs.join("20240101.log")).unwrap();
    assert!(rotated.starts_with("2024-01-01 10:00:00\n"));
    assert!(!rotated.contains("first of the day"));
    assert_eq!(
        fs::read_to_string(logs.join("errors/20240101_error.log")).unwrap(),
        "yesterday's error\n"
    );

    let active = fs::read_to_string(logs.join(".latest.log")).unwrap();
    assert!(active.starts_with("2024-01-03 06:45:12\n"));
    assert!(active.contains("first of the day"));

    assert!(!logs.join("archived_logs.zip").exists());
    assert!(!logs.join("errors/archived_errors.zip").exists());
}

#[test]
fn aged_files_are_archived_per_stream_and_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_active(dir.path(), "2024-01-04 22:00:00");
    let logs = dir.path().join("logs");
    fs::write(logs.join("20231201.log"), "main from december\n").unwrap();
    fs::write(logs.join("errors/20231201_error.log"), "error from december\n").unwrap();
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-05 00:01 UTC)));

    let mut manager = LogManager::with_clock(&config(dir.path()), clock).unwrap();
    let outcome = manager.warm_up().unwrap();
    assert!(matches!(outcome, RotationOutcome::Rotated { archived: 2, .. }));

    assert!(!logs.join("20231201.log").exists());
    assert!(!logs.join("errors/20231201_error.log").exists());
    assert!(logs.join("20240104.log").exists());

    let main_archive = logs.join("archived_logs.zip");
    let error_archive = logs.join("errors/archived_errors.zip");
    assert_eq!(entry_names(&main_archive).unwrap(), vec!["20231201.log"]);
    assert_eq!(entry_names(&error_archive).unwrap(), vec!["20231201_error.log"]);
    assert_eq!(
        read_entry(&main_archive, "20231201.log").unwrap(),
        b"main from december\n"
    );
    assert_eq!(
        read_entry(&error_archive, "20231201_error.log").unwrap(),
        b"error from december\n"
    );
}

#[test]
fn restored_duplicate_is_deleted_but_not_readded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    let archive_path = logs.join("archived_logs.zip");

    fs::write(logs.join("20231101.log"), "archived copy\n").unwrap();
    archive::archive(&logs, &archive_path, 30, date!(2024 - 01 - 05)).unwrap();

    fs::write(logs.join("20231101.log"), "restored from backup\n").unwrap();
    fs::write(logs.join("20231115.log"), "mid november\n").unwrap();
    let report = archive::archive(&logs, &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
    assert_eq!(report.added, vec!["20231115.log"]);
    assert_eq!(report.duplicates, vec!["20231101.log"]);

    let mut names = entry_names(&archive_path).unwrap();
    names.sort();
    assert_eq!(names, vec!["20231101.log", "20231115.log"]);
    assert_eq!(read_entry(&archive_path, "20231101.log").unwrap(), b"archived copy\n");
    assert!(!logs.join("20231101.log").exists());
    assert!(!logs.join("20231115.log").exists());
}

#[test]
fn unparseable_header_leaves_active_file_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_active(dir.path(), "this is not a timestamp");
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-03 12:00 UTC)));

    let mut manager = LogManager::with_clock(&config(dir.path()), clock).unwrap();
    let outcome = manager.warm_up().unwrap();
    assert!(matches!(outcome, RotationOutcome::Aborted(daylog::Error::Parse(_))));
    assert!(manager.is_open(Stream::Main));

    manager.log(&Record::new(Level::WARN, "still writing")).unwrap();
    let active = fs::read_to_string(dir.path().join("logs/.latest.log")).unwrap();
    assert!(active.starts_with("this is not a timestamp\nyesterday's line\n"));
    assert!(active.contains("still writing"));

    let entries: Vec<_> = fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(entries.iter().all(|name| !name.ends_with(".zip")));
    assert!(entries.iter().all(|name| name.starts_with('.') || name == "errors"));
}

#[test]
fn archive_grows_as_union_over_many_days() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 08:00 UTC)));
    let cfg = config(dir.path()).with_retention_days(2);
    let ctx = LoggingContext::with_clock(&cfg, clock.clone()).unwrap();

    for day in 0..6 {
        ctx.log(&Record::new(Level::INFO, format!("day {}", day))).unwrap();
        ctx.log(&Record::new(Level::ERROR, format!("failure {}", day))).unwrap();
        clock.advance(time::Duration::days(1));
        assert!(matches!(ctx.check_rotation().unwrap(), RotationOutcome::Rotated { .. }));
        assert!(matches!(ctx.check_rotation().unwrap(), RotationOutcome::Current));
    }
    ctx.shutdown().unwrap();

    // Today is 2024-01-07: files dated up to 2024-01-05 are archived.
    let logs = dir.path().join("logs");
    let mut names = entry_names(&logs.join("archived_logs.zip")).unwrap();
    names.sort();
    assert_eq!(
        names,
        vec![
            "20240101.log",
            "20240102.log",
            "20240103.log",
            "20240104.log",
            "20240105.log"
        ]
    );
    assert!(logs.join("20240106.log").exists());
    assert!(!logs.join("20240105.log").exists());

    let day_three = read_entry(&logs.join("archived_logs.zip"), "20240103.log").unwrap();
    let text = String::from_utf8(day_three).unwrap();
    assert!(text.starts_with("2024-01-03 08:00:00\n"));
    assert!(text.contains("day 2"));

    let mut errors = entry_names(&logs.join("errors/archived_errors.zip")).unwrap();
    errors.sort();
    assert_eq!(errors.len(), 5);
    assert_eq!(errors[0], "20240101_error.log");
}
