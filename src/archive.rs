//! Rolling zip archive of aged rotated files.
//!
//! Every pass that finds eligible files rebuilds the archive into a
//! temporary file, carrying over all existing entries, and renames it over
//! the old one. Source files are deleted only after that rename succeeded,
//! so a crash at any point leaves either the old archive with the sources
//! still on disk or the new archive containing them.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use time::Date;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::rotation::ERROR_SUFFIX;
use crate::timestamp;
use crate::{Error, Result};

/// What one archival pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Entry names newly written to the archive.
    pub added: Vec<String>,
    /// Eligible files whose name was already archived; deleted without re-adding.
    pub duplicates: Vec<String>,
    /// Source files removed from disk after the swap.
    pub removed: Vec<PathBuf>,
}

impl ArchiveReport {
    /// Whether the pass left the directory untouched.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.duplicates.is_empty()
    }
}

/// Move rotated files in `directory` dated `retention_days` or more before
/// `today` into the zip at `archive_path`.
///
/// On error the temporary archive is removed and the previous archive and
/// every source file are left as they were.
pub fn archive(
    directory: &Path,
    archive_path: &Path,
    retention_days: u32,
    today: Date,
) -> Result<ArchiveReport> {
    if !directory.is_dir() {
        return Ok(ArchiveReport::default());
    }

    let cutoff = timestamp::days_before(today, retention_days);
    let eligible = eligible_files(directory, cutoff)?;
    if eligible.is_empty() {
        return Ok(ArchiveReport::default());
    }

    let temp_path = temp_path_for(archive_path);
    let swapped = rebuild(archive_path, &temp_path, &eligible).and_then(|report| {
        fs::rename(&temp_path, archive_path)?;
        Ok(report)
    });
    let mut report = match swapped {
        Ok(report) => report,
        Err(e) => {
            if temp_path.exists()
                && let Err(cleanup) = fs::remove_file(&temp_path)
            {
                tracing::warn!("removing {} failed: {}", temp_path.display(), cleanup);
            }
            return Err(e);
        }
    };

    for path in eligible {
        match fs::remove_file(&path) {
            Ok(()) => report.removed.push(path),
            Err(e) => tracing::warn!("removing archived {} failed: {}", path.display(), e),
        }
    }

    tracing::info!(
        "archived {} log file(s) into {}",
        report.added.len() + report.duplicates.len(),
        archive_path.display()
    );
    Ok(report)
}

/// Rotated files in `directory` dated on or before `cutoff`, sorted by name.
///
/// Reserved (dot-prefixed) files are ignored; names whose date cannot be
/// parsed are skipped with a warning.
pub fn eligible_files(directory: &Path, cutoff: Date) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let Some(stem) = name.strip_suffix(".log") else {
            continue;
        };

        let stamp = stem.strip_suffix(ERROR_SUFFIX).unwrap_or(stem);
        match timestamp::parse_date_stamp(stamp) {
            Ok(date) if date <= cutoff => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("skipping {}: {}", name, e),
        }
    }
    files.sort();
    Ok(files)
}

/// Entry names stored in the archive at `archive_path`.
pub fn entry_names(archive_path: &Path) -> Result<Vec<String>> {
    let archive = ZipArchive::new(File::open(archive_path)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Decompressed content of entry `name`.
pub fn read_entry(archive_path: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut entry = archive.by_name(name)?;
    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;
    Ok(content)
}

fn rebuild(archive_path: &Path, temp_path: &Path, eligible: &[PathBuf]) -> Result<ArchiveReport> {
    let mut writer = ZipWriter::new(File::create(temp_path)?);
    let mut names = HashSet::new();

    if let Some(mut previous) = open_previous(archive_path) {
        for i in 0..previous.len() {
            let entry = previous.by_index_raw(i)?;
            if names.insert(entry.name().to_string()) {
                writer.raw_copy_file(entry)?;
            }
        }
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut report = ArchiveReport::default();
    for path in eligible {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Rotation(format!("{} has no file name", path.display())))?;

        if !names.insert(name.clone()) {
            report.duplicates.push(name);
            continue;
        }
        writer.start_file(name.as_str(), options)?;
        io::copy(&mut File::open(path)?, &mut writer)?;
        report.added.push(name);
    }

    writer.finish()?.sync_all()?;
    Ok(report)
}

// An archive that exists but cannot be read is treated as empty and will be
// replaced by the rebuilt one.
fn open_previous(archive_path: &Path) -> Option<ZipArchive<File>> {
    if !archive_path.exists() {
        return None;
    }
    match File::open(archive_path)
        .map_err(Error::from)
        .and_then(|f| ZipArchive::new(f).map_err(Error::from))
    {
        Ok(archive) => Some(archive),
        Err(e) => {
            tracing::error!(
                "existing archive {} is unreadable, rebuilding without it: {}",
                archive_path.display(),
                e
            );
            None
        }
    }
}

fn temp_path_for(archive_path: &Path) -> PathBuf {
    let mut name = archive_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".temp");
    archive_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::macros::date;

    fn write_log(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_eligible_files_filters_by_date_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(dir.path(), "20231201.log", "a");
        write_log(dir.path(), "20231201_error.log", "b");
        write_log(dir.path(), "20240104.log", "recent");
        write_log(dir.path(), ".latest.log", "2023-01-01 00:00:00\n");
        write_log(dir.path(), "notes.log", "not dated");
        write_log(dir.path(), "20231201.txt", "other extension");
        fs::create_dir(dir.path().join("errors")).unwrap();

        let files = eligible_files(dir.path(), date!(2023 - 12 - 06)).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["20231201.log", "20231201_error.log"]);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(dir.path(), "20231206.log", "edge");
        write_log(dir.path(), "20231207.log", "inside retention");

        let files = eligible_files(dir.path(), date!(2023 - 12 - 06)).unwrap();
        assert_eq!(files, vec![dir.path().join("20231206.log")]);
    }

    #[test]
    fn test_nothing_eligible_leaves_directory_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(dir.path(), "20240104.log", "recent");
        let archive_path = dir.path().join("archived_logs.zip");

        let report = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
        assert!(report.is_empty());
        assert!(!archive_path.exists());
        assert!(dir.path().join("20240104.log").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let report = archive(&missing, &missing.join("a.zip"), 30, date!(2024 - 01 - 05)).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_archive_merges_and_deletes_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("archived_logs.zip");
        write_log(dir.path(), "20231101.log", "november\n");

        let first = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
        assert_eq!(first.added, vec!["20231101.log"]);
        assert!(!dir.path().join("20231101.log").exists());

        write_log(dir.path(), "20231201.log", "december\n");
        let second = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
        assert_eq!(second.added, vec!["20231201.log"]);
        assert_eq!(second.removed, vec![dir.path().join("20231201.log")]);

        let mut names = entry_names(&archive_path).unwrap();
        names.sort();
        assert_eq!(names, vec!["20231101.log", "20231201.log"]);
        assert_eq!(read_entry(&archive_path, "20231101.log").unwrap(), b"november\n");
        assert!(!dir.path().join("archived_logs.zip.temp").exists());
    }

    #[test]
    fn test_duplicate_name_is_not_readded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("archived_logs.zip");
        write_log(dir.path(), "20231101.log", "original\n");
        archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();

        write_log(dir.path(), "20231101.log", "restored from backup\n");
        let report = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.duplicates, vec!["20231101.log"]);
        assert!(!dir.path().join("20231101.log").exists());

        let names = entry_names(&archive_path).unwrap();
        assert_eq!(names.iter().filter(|n| *n == "20231101.log").count(), 1);
        assert_eq!(read_entry(&archive_path, "20231101.log").unwrap(), b"original\n");
    }

    #[test]
    fn test_corrupt_archive_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("archived_logs.zip");
        fs::File::create(&archive_path)
            .unwrap()
            .write_all(b"definitely not a zip")
            .unwrap();
        write_log(dir.path(), "20231201.log", "december\n");

        let report = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();
        assert_eq!(report.added, vec!["20231201.log"]);
        assert_eq!(entry_names(&archive_path).unwrap(), vec!["20231201.log"]);
    }

    #[test]
    fn test_unreadable_entry_aborts_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("archived_logs.zip");
        write_log(dir.path(), "20231101.log", "november\n");
        write_log(dir.path(), "20231102.log", "november again\n");
        archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05)).unwrap();

        // The central directory still lists both entries, but the first
        // entry's local header no longer carries its signature.
        let mut bytes = fs::read(&archive_path).unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        bytes[..4].copy_from_slice(b"XXXX");
        fs::write(&archive_path, &bytes).unwrap();
        assert_eq!(entry_names(&archive_path).unwrap().len(), 2);

        write_log(dir.path(), "20231201.log", "december\n");
        let result = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05));
        assert!(matches!(result, Err(Error::Archive(_))));
        assert_eq!(fs::read(&archive_path).unwrap(), bytes);
        assert_eq!(
            fs::read_to_string(dir.path().join("20231201.log")).unwrap(),
            "december\n"
        );
        assert!(!dir.path().join("archived_logs.zip.temp").exists());
    }

    #[test]
    fn test_failed_swap_keeps_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_log(dir.path(), "20231201.log", "december\n");
        // A directory in the archive's place makes the final rename fail.
        let archive_path = dir.path().join("archived_logs.zip");
        fs::create_dir(&archive_path).unwrap();
        fs::write(archive_path.join("keep"), "x").unwrap();

        let result = archive(dir.path(), &archive_path, 30, date!(2024 - 01 - 05));
        assert!(result.is_err());
        assert!(dir.path().join("20231201.log").exists());
        assert!(!dir.path().join("archived_logs.zip.temp").exists());
        assert!(archive_path.join("keep").exists());
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/logs/archived_logs.zip")),
            PathBuf::from("/logs/archived_logs.zip.temp")
        );
    }
}
