//! Shared contracts between the pairsync daemon and its workers.
//!
//! A worker is a one-shot process invoked with four positional
//! arguments: source directory, target directory, a file name (or the
//! literal `ALL`), and an operation name. It may write arbitrary
//! diagnostic lines to stdout followed by exactly one report block;
//! the daemon interprets only the report block, never the exit code.

pub mod report;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub use report::{Report, SyncStatus};

/// Literal file argument meaning "the whole directory".
pub const ALL_FILES: &str = "ALL";

/// Kind of change a worker is asked to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    /// Copy every regular file in the source directory.
    Full,
    /// A file appeared in the source; copy it.
    Added,
    /// A file changed in the source; copy it again.
    Modified,
    /// A file vanished from the source; remove it from the target.
    Deleted,
    /// Change notification of a kind the daemon does not understand.
    Unknown,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Full => "FULL",
            SyncOperation::Added => "ADDED",
            SyncOperation::Modified => "MODIFIED",
            SyncOperation::Deleted => "DELETED",
            SyncOperation::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sync operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for SyncOperation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL" => Ok(SyncOperation::Full),
            "ADDED" => Ok(SyncOperation::Added),
            "MODIFIED" => Ok(SyncOperation::Modified),
            "DELETED" => Ok(SyncOperation::Deleted),
            "UNKNOWN" => Ok(SyncOperation::Unknown),
            other => Err(ParseOperationError(other.to_string())),
        }
    }
}

/// File argument of a task: one name inside the source directory, or
/// the whole directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFile {
    All,
    Name(String),
}

impl TaskFile {
    pub fn as_arg(&self) -> &str {
        match self {
            TaskFile::All => ALL_FILES,
            TaskFile::Name(name) => name,
        }
    }
}

impl fmt::Display for TaskFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// One unit of synchronization work, from creation by an event or a
/// command until it is consumed by a worker spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub source: PathBuf,
    pub target: PathBuf,
    pub file: TaskFile,
    pub operation: SyncOperation,
}

impl SyncTask {
    /// Full-directory sync, as issued at startup and by the `sync`
    /// command.
    pub fn full(source: PathBuf, target: PathBuf) -> Self {
        Self {
            source,
            target,
            file: TaskFile::All,
            operation: SyncOperation::Full,
        }
    }

    /// Single-file task derived from a filesystem change.
    pub fn for_file(
        source: PathBuf,
        target: PathBuf,
        file: String,
        operation: SyncOperation,
    ) -> Self {
        Self {
            source,
            target,
            file: TaskFile::Name(file),
            operation,
        }
    }

    /// The four positional arguments of the worker invocation contract.
    pub fn to_args(&self) -> [OsString; 4] {
        [
            self.source.clone().into_os_string(),
            self.target.clone().into_os_string(),
            OsString::from(self.file.as_arg()),
            OsString::from(self.operation.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_round_trips_through_str() {
        for op in [
            SyncOperation::Full,
            SyncOperation::Added,
            SyncOperation::Modified,
            SyncOperation::Deleted,
            SyncOperation::Unknown,
        ] {
            assert_eq!(op.as_str().parse::<SyncOperation>(), Ok(op));
        }
    }

    #[test]
    fn unrecognized_operation_is_rejected() {
        assert!("COPY".parse::<SyncOperation>().is_err());
        assert!("full".parse::<SyncOperation>().is_err());
    }

    #[test]
    fn full_task_uses_all_marker() {
        let task = SyncTask::full(PathBuf::from("/a"), PathBuf::from("/b"));
        let args = task.to_args();
        assert_eq!(args[2], OsString::from("ALL"));
        assert_eq!(args[3], OsString::from("FULL"));
    }

    #[test]
    fn file_task_carries_name_and_operation() {
        let task = SyncTask::for_file(
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            "f.txt".to_string(),
            SyncOperation::Modified,
        );
        let args = task.to_args();
        assert_eq!(args[0], OsString::from("/a"));
        assert_eq!(args[1], OsString::from("/b"));
        assert_eq!(args[2], OsString::from("f.txt"));
        assert_eq!(args[3], OsString::from("MODIFIED"));
    }
}
