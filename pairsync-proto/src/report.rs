//! Worker result reports.
//!
//! A worker ends its stdout with a delimited block:
//!
//! ```text
//! EXEC_REPORT_START
//! STATUS: SUCCESS
//! DETAILS: 3 files processed
//! EXEC_REPORT_END
//! ```
//!
//! Parsing never fails: anything outside the markers is treated as
//! diagnostics, and a missing block or missing `STATUS:` line degrades
//! to [`SyncStatus::Unknown`].

use std::fmt;

/// Opening marker line of a report block.
pub const REPORT_START: &str = "EXEC_REPORT_START";
/// Closing marker line of a report block.
pub const REPORT_END: &str = "EXEC_REPORT_END";

const STATUS_PREFIX: &str = "STATUS:";
const DETAILS_PREFIX: &str = "DETAILS:";

/// Outcome a worker claims for its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Error,
    Partial,
    /// Report was missing or malformed.
    Unknown,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Error => "ERROR",
            SyncStatus::Partial => "PARTIAL",
            SyncStatus::Unknown => "UNKNOWN",
        }
    }

    fn from_token(token: &str) -> SyncStatus {
        match token {
            "SUCCESS" => SyncStatus::Success,
            "ERROR" => SyncStatus::Error,
            "PARTIAL" => SyncStatus::Partial,
            _ => SyncStatus::Unknown,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed result of one worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: SyncStatus,
    pub details: String,
}

impl Default for Report {
    fn default() -> Self {
        Report {
            status: SyncStatus::Unknown,
            details: String::new(),
        }
    }
}

impl Report {
    pub fn new(status: SyncStatus, details: impl Into<String>) -> Self {
        Report {
            status,
            details: details.into(),
        }
    }

    /// Extract the report block from a worker's captured stdout.
    ///
    /// Only lines between the start and end markers are considered; if
    /// several blocks appear, later fields win.
    pub fn parse(raw: &[u8]) -> Report {
        let text = String::from_utf8_lossy(raw);
        let mut report = Report::default();
        let mut in_block = false;
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line == REPORT_START {
                in_block = true;
            } else if line == REPORT_END {
                in_block = false;
            } else if in_block {
                if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
                    report.status = SyncStatus::from_token(rest.trim());
                } else if let Some(rest) = line.strip_prefix(DETAILS_PREFIX) {
                    report.details = rest.trim().to_string();
                }
            }
        }
        report
    }

    /// Format the block the way a worker writes it.
    pub fn render(&self) -> String {
        format!(
            "{REPORT_START}\n{STATUS_PREFIX} {}\n{DETAILS_PREFIX} {}\n{REPORT_END}\n",
            self.status, self.details
        )
    }
}
