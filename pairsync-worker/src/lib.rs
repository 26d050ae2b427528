//! Synchronization operations performed by the worker process.
//!
//! The worker is deliberately dumb: it receives one task on the
//! command line, performs it, prints human-readable diagnostics to
//! stdout, and ends with a report block the daemon parses. It never
//! talks to the daemon any other way.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use pairsync_proto::{Report, SyncOperation, SyncStatus, TaskFile};

const COPY_BUF: usize = 4096;

/// Copy one regular file, returning the number of bytes moved.
pub fn copy_file(source: &Path, target: &Path) -> std::io::Result<u64> {
    let mut src = File::open(source)?;
    let mut dst = File::create(target)?;

    let mut buf = [0u8; COPY_BUF];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
    dst.flush()?;
    Ok(total)
}

/// Remove one file from the target directory. A file that is already
/// gone counts as deleted.
pub fn delete_file(target: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy every regular file from `source_dir` into `target_dir`,
/// non-recursively. Subdirectories and special files are skipped and
/// counted; copy failures degrade the report to PARTIAL or ERROR.
pub fn full_sync(source_dir: &Path, target_dir: &Path) -> Report {
    let entries = match std::fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!(
                "ERROR: Cannot open source directory {}: {e}",
                source_dir.display()
            );
            return Report::new(SyncStatus::Error, "Operation failed");
        }
    };

    if let Err(e) = std::fs::create_dir_all(target_dir) {
        println!(
            "ERROR: Cannot create target directory {}: {e}",
            target_dir.display()
        );
        return Report::new(SyncStatus::Error, "Operation failed");
    }

    let mut processed = 0u32;
    let mut skipped = 0u32;
    let mut errors = 0u32;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                println!("ERROR: Cannot read directory entry: {e}");
                skipped += 1;
                errors += 1;
                continue;
            }
        };
        let source_path = entry.path();
        let is_file = match entry.file_type() {
            Ok(kind) => kind.is_file(),
            Err(e) => {
                println!("ERROR: Cannot stat {}: {e}", source_path.display());
                skipped += 1;
                errors += 1;
                continue;
            }
        };
        if !is_file {
            skipped += 1;
            continue;
        }

        let target_path = target_dir.join(entry.file_name());
        match copy_file(&source_path, &target_path) {
            Ok(_) => {
                println!(
                    "SUCCESS: Copied {} to {}",
                    source_path.display(),
                    target_path.display()
                );
                processed += 1;
            }
            Err(e) => {
                println!("ERROR: Cannot copy {}: {e}", source_path.display());
                skipped += 1;
                errors += 1;
            }
        }
    }

    if errors > 0 {
        if processed > 0 {
            Report::new(
                SyncStatus::Partial,
                format!("{processed} files copied, {skipped} skipped"),
            )
        } else {
            Report::new(SyncStatus::Error, "Operation failed")
        }
    } else {
        Report::new(SyncStatus::Success, format!("{processed} files processed"))
    }
}

/// Perform one task and produce its report.
pub fn run(
    source_dir: &Path,
    target_dir: &Path,
    file: &TaskFile,
    operation: SyncOperation,
) -> Report {
    match operation {
        SyncOperation::Full => full_sync(source_dir, target_dir),
        SyncOperation::Added | SyncOperation::Modified => {
            let TaskFile::Name(name) = file else {
                return Report::new(SyncStatus::Error, "Missing file name");
            };
            let source = source_dir.join(name);
            let target = target_dir.join(name);
            if let Err(e) = std::fs::create_dir_all(target_dir) {
                println!(
                    "ERROR: Cannot create target directory {}: {e}",
                    target_dir.display()
                );
                return Report::new(SyncStatus::Error, format!("File {name} was not copied"));
            }
            match copy_file(&source, &target) {
                Ok(_) => Report::new(SyncStatus::Success, format!("File {name} was copied")),
                Err(e) => {
                    println!("ERROR: Cannot copy {}: {e}", source.display());
                    Report::new(SyncStatus::Error, format!("File {name} was not copied"))
                }
            }
        }
        SyncOperation::Deleted => {
            let TaskFile::Name(name) = file else {
                return Report::new(SyncStatus::Error, "Missing file name");
            };
            let target = target_dir.join(name);
            match delete_file(&target) {
                Ok(()) => Report::new(SyncStatus::Success, format!("File {name} was deleted")),
                Err(e) => {
                    println!("ERROR: Cannot delete {}: {e}", target.display());
                    Report::new(SyncStatus::Error, format!("File {name} was not deleted"))
                }
            }
        }
        SyncOperation::Unknown => {
            Report::new(SyncStatus::Error, "Unknown operation UNKNOWN")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copy_preserves_contents_larger_than_one_buffer() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("big.bin");
        let target = dir.path().join("copy.bin");
        let payload: Vec<u8> = (0..3 * COPY_BUF + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &payload).unwrap();

        let moved = copy_file(&source, &target).unwrap();
        assert_eq!(moved, payload.len() as u64);
        assert_eq!(std::fs::read(&target).unwrap(), payload);
    }

    #[test]
    fn copy_overwrites_an_existing_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("f");
        let target = dir.path().join("g");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&target, "an older, longer payload").unwrap();

        copy_file(&source, &target).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn deleting_a_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        assert!(delete_file(&dir.path().join("ghost")).is_ok());
    }

    #[test]
    fn full_sync_copies_regular_files_and_skips_directories() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        std::fs::create_dir_all(source.join("subdir")).unwrap();
        std::fs::write(source.join("a.txt"), "A").unwrap();
        std::fs::write(source.join("b.txt"), "B").unwrap();

        let report = full_sync(&source, &target);
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.details, "2 files processed");
        assert_eq!(std::fs::read_to_string(target.join("a.txt")).unwrap(), "A");
        assert_eq!(std::fs::read_to_string(target.join("b.txt")).unwrap(), "B");
        assert!(!target.join("subdir").exists());
    }

    #[test]
    fn full_sync_of_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let report = full_sync(&dir.path().join("absent"), &dir.path().join("dst"));
        assert_eq!(report.status, SyncStatus::Error);
        assert_eq!(report.details, "Operation failed");
    }

    #[test]
    fn full_sync_creates_the_target_directory() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("f"), "x").unwrap();

        let target = dir.path().join("deep").join("dst");
        let report = full_sync(&source, &target);
        assert_eq!(report.status, SyncStatus::Success);
        assert!(target.join("f").exists());
    }

    #[test]
    fn run_dispatches_single_file_operations() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(source.join("f.txt"), "X").unwrap();

        let file = TaskFile::Name("f.txt".to_string());
        let report = run(&source, &target, &file, SyncOperation::Added);
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.details, "File f.txt was copied");
        assert_eq!(std::fs::read_to_string(target.join("f.txt")).unwrap(), "X");

        let report = run(&source, &target, &file, SyncOperation::Deleted);
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.details, "File f.txt was deleted");
        assert!(!target.join("f.txt").exists());
    }

    #[test]
    fn run_reports_error_for_a_missing_single_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        std::fs::create_dir_all(&source).unwrap();

        let file = TaskFile::Name("ghost".to_string());
        let report = run(&source, &target, &file, SyncOperation::Modified);
        assert_eq!(report.status, SyncStatus::Error);
        assert_eq!(report.details, "File ghost was not copied");
    }

    #[test]
    fn run_rejects_unknown_operations() {
        let dir = tempdir().unwrap();
        let report = run(dir.path(), dir.path(), &TaskFile::All, SyncOperation::Unknown);
        assert_eq!(report.status, SyncStatus::Error);
        assert!(report.details.starts_with("Unknown operation"));
    }
}
