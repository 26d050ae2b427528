//! The append-only sync journal.
//!
//! Worker start and completion records use a fixed bracketed layout so
//! the log can be post-processed; operational records are free text.
//! Every line is timestamp-prefixed. Journal write failures are
//! reported through tracing but never interrupt the daemon.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use tracing::warn;

use pairsync_proto::{Report, SyncTask};

/// Local-time stamp used by the journal and by command responses.
pub fn timestamp() -> String {
    Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string()
}

pub struct Journal {
    file: File,
}

impl Journal {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Journal { file })
    }

    /// Append one timestamp-prefixed free-text record.
    pub fn line(&mut self, message: &str) {
        self.write(&format!("{} {message}\n", timestamp()));
    }

    /// Record a spawned worker.
    pub fn worker_started(&mut self, task: &SyncTask, pid: u32) {
        self.write(&format!(
            "{} [{}] [{}] [{pid}] [{}] [STARTED] [File: {}]\n",
            timestamp(),
            task.source.display(),
            task.target.display(),
            task.operation,
            task.file,
        ));
    }

    /// Record a reaped worker and its parsed report.
    pub fn worker_finished(&mut self, task: &SyncTask, pid: u32, report: &Report) {
        self.write(&format!(
            "{} [{}] [{}] [{pid}] [{}] [{}] [{}]\n",
            timestamp(),
            task.source.display(),
            task.target.display(),
            task.operation,
            report.status,
            report.details,
        ));
    }

    /// Record a task parked in the overflow queue.
    pub fn task_queued(&mut self, task: &SyncTask) {
        self.write(&format!(
            "{} Queued task: {} -> {} ({} {})\n",
            timestamp(),
            task.source.display(),
            task.target.display(),
            task.operation,
            task.file,
        ));
    }

    fn write(&mut self, line: &str) {
        if let Err(e) = self.file.write_all(line.as_bytes()).and_then(|_| self.file.flush()) {
            warn!(error = %e, "journal write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairsync_proto::{SyncStatus, SyncTask};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn completion_record_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let mut journal = Journal::open(&path).unwrap();

        let task = SyncTask::full(PathBuf::from("/a"), PathBuf::from("/b"));
        journal.worker_started(&task, 42);
        journal.worker_finished(&task, 42, &Report::new(SyncStatus::Success, "3 files processed"));

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let started = lines.next().unwrap();
        let finished = lines.next().unwrap();

        assert!(started.ends_with("[/a] [/b] [42] [FULL] [STARTED] [File: ALL]"));
        assert!(finished.ends_with("[/a] [/b] [42] [FULL] [SUCCESS] [3 files processed]"));
        // Timestamp prefix: [YYYY-MM-DD HH:MM:SS]
        assert!(started.starts_with('['));
        assert_eq!(started.find(']').unwrap(), 20);
    }

    #[test]
    fn journal_appends_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");

        Journal::open(&path).unwrap().line("first");
        Journal::open(&path).unwrap().line("second");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().ends_with("second"));
    }
}
