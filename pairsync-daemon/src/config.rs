//! Daemon flags and pair-file loading.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::errors::{DaemonError, Result};

#[derive(Debug, Parser)]
#[command(name = "pairsyncd")]
#[command(about = "Directory pair synchronization daemon", long_about = None)]
#[command(version)]
pub struct DaemonArgs {
    /// Path to the pair configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the append-only sync journal
    #[arg(short = 'l', long, default_value = "pairsync.log")]
    pub journal: PathBuf,

    /// Maximum number of concurrent worker processes
    #[arg(short = 'n', long, default_value_t = 5)]
    pub workers: usize,

    /// Worker executable spawned for each task
    #[arg(long, default_value = "pairsync-worker")]
    pub worker_bin: PathBuf,

    /// Inbound command pipe, created at startup
    #[arg(long, default_value = "pairsync.in")]
    pub pipe_in: PathBuf,

    /// Outbound response pipe, created at startup
    #[arg(long, default_value = "pairsync.out")]
    pub pipe_out: PathBuf,
}

/// Parse the line-oriented pair file: blank lines and `#` comments are
/// skipped, every other line is `<source> <target>`. Unreadable or
/// malformed input is fatal at startup.
pub fn load_pairs(path: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DaemonError::Config(format!("cannot read {}: {e}", path.display())))?;

    let mut pairs = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(source), Some(target)) => {
                pairs.push((PathBuf::from(source), PathBuf::from(target)));
            }
            _ => {
                return Err(DaemonError::Config(format!(
                    "{}:{}: expected `<source> <target>`",
                    path.display(),
                    lineno + 1
                )));
            }
        }
    }
    Ok(pairs)
}
