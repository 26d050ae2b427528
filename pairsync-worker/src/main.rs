use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pairsync_proto::{Report, SyncOperation, SyncStatus, TaskFile, ALL_FILES};

/// One-shot sync worker. Invoked by the daemon, one process per task;
/// the execution report on stdout is the whole interface.
#[derive(Debug, Parser)]
#[command(name = "pairsync-worker")]
#[command(version)]
struct WorkerArgs {
    /// Directory the change came from
    source_dir: PathBuf,
    /// Directory the change is propagated to
    target_dir: PathBuf,
    /// File name inside the source directory, or ALL
    file: String,
    /// FULL, ADDED, MODIFIED or DELETED
    operation: String,
}

fn main() -> ExitCode {
    let args = WorkerArgs::parse();

    let file = if args.file == ALL_FILES {
        TaskFile::All
    } else {
        TaskFile::Name(args.file)
    };

    let report = match args.operation.parse::<SyncOperation>() {
        Ok(operation) => pairsync_worker::run(&args.source_dir, &args.target_dir, &file, operation),
        Err(_) => Report::new(
            SyncStatus::Error,
            format!("Unknown operation {}", args.operation),
        ),
    };

    print!("{}", report.render());

    if report.status == SyncStatus::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
