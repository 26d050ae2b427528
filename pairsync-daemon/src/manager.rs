//! The daemon's control loop.
//!
//! A single task owns every piece of mutable state and multiplexes
//! four inputs: console commands, filesystem events, worker
//! completions, and a one-second housekeeping tick. Nothing here
//! blocks; long-running work always happens in worker processes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pairsync_proto::{Report, SyncStatus, SyncTask};
use pairsync_registry::{Registry, SyncEntry};

use crate::commands::Command;
use crate::console::Console;
use crate::errors::Result;
use crate::journal::{timestamp, Journal};
use crate::scheduler::{Scheduler, WorkerExit};
use crate::watch_table::WatchTable;
use crate::watcher::{convert_event, SourceWatcher};

pub struct ManagerSettings {
    pub journal: PathBuf,
    pub worker_bin: PathBuf,
    pub worker_limit: usize,
    pub pipe_in: PathBuf,
    pub pipe_out: PathBuf,
}

pub struct Manager {
    registry: Registry,
    watch_table: WatchTable,
    watcher: SourceWatcher,
    scheduler: Scheduler,
    exits: mpsc::UnboundedReceiver<WorkerExit>,
    journal: Journal,
    console: Console,
    running: bool,
}

impl Manager {
    pub fn new(settings: ManagerSettings, expected_sources: usize) -> Result<Self> {
        let journal = Journal::open(&settings.journal)?;
        let console = Console::create(&settings.pipe_in, &settings.pipe_out)?;
        let watcher = SourceWatcher::new()?;
        let (scheduler, exits) = Scheduler::new(settings.worker_bin, settings.worker_limit);

        Ok(Manager {
            registry: Registry::with_expected(expected_sources),
            watch_table: WatchTable::new(),
            watcher,
            scheduler,
            exits,
            journal,
            console,
            running: true,
        })
    }

    /// Register the configured pairs and issue their initial full
    /// syncs. A pair that cannot be monitored is skipped, not fatal.
    pub fn bootstrap(&mut self, pairs: Vec<(PathBuf, PathBuf)>) {
        for (source, target) in pairs {
            self.cmd_add(source, target);
        }
    }

    /// Run until shutdown. Ctrl-C takes the same path as the
    /// `shutdown` command.
    pub async fn run(&mut self) -> Result<()> {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(sources = self.registry.len(), "manager running");
        while self.running {
            tokio::select! {
                lines = self.console.next_commands() => {
                    for line in lines? {
                        self.handle_line(&line).await;
                    }
                }
                event = self.watcher.recv() => {
                    if let Some(first) = event {
                        self.handle_fs_event(first);
                        // Drain the burst so one editor save does not
                        // take several loop turns.
                        while let Some(next) = self.watcher.try_recv() {
                            self.handle_fs_event(next);
                        }
                    }
                }
                exit = self.exits.recv() => {
                    if let Some(exit) = exit {
                        self.finish_worker(exit, true);
                    }
                }
                _ = tick.tick() => {
                    self.console.connect_output();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    self.cmd_shutdown().await;
                }
            }
        }
        Ok(())
    }

    /// Journal a message and echo it, timestamped, to the console.
    fn announce(&mut self, message: &str) {
        self.journal.line(message);
        self.console.send(&format!("{} {message}", timestamp()));
    }

    async fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Some(Command::Add { source, target }) => self.cmd_add(source, target),
            Some(Command::Cancel { source }) => self.cmd_cancel(&source),
            Some(Command::Status { source }) => self.cmd_status(&source),
            Some(Command::Sync { source }) => self.cmd_sync(&source),
            Some(Command::Shutdown) => self.cmd_shutdown().await,
            None => self.announce(&format!("Unrecognized command: {line}")),
        }
    }

    /// `add <source> <target>`: start monitoring a pair. Re-adding an
    /// active pair with the same target is a no-op; an inactive or
    /// retargeted source is brought back under its new target.
    fn cmd_add(&mut self, source: PathBuf, target: PathBuf) {
        if let Some(entry) = self.registry.get(&source) {
            if entry.active && entry.target == target {
                self.announce(&format!("Already in queue: {}", source.display()));
                return;
            }
        }

        if let Err(e) = std::fs::create_dir_all(&target) {
            warn!(target = %target.display(), error = %e, "cannot create target directory");
        }

        if !self.watch_table.is_bound(&source) {
            if let Err(e) = self.watcher.watch(&source) {
                self.announce(&format!(
                    "Failed to monitor {}: {e}",
                    source.display()
                ));
                return;
            }
            self.watch_table.bind(source.clone());
        }
        self.registry.insert(&source, SyncEntry::new(target.clone()));

        self.announce(&format!(
            "Added directory: {} -> {}",
            source.display(),
            target.display()
        ));
        self.announce(&format!("Monitoring started for {}", source.display()));

        self.scheduler
            .submit(SyncTask::full(source, target), &mut self.journal);
    }

    /// `cancel <source>`: stop monitoring. The entry stays in the
    /// registry, inactive, so its history survives.
    fn cmd_cancel(&mut self, source: &Path) {
        let monitored = self.registry.get(source).map(|e| e.active).unwrap_or(false);
        if !monitored {
            self.announce(&format!("Directory not monitored: {}", source.display()));
            return;
        }

        if let Some(entry) = self.registry.get_mut(source) {
            entry.active = false;
        }
        if self.watch_table.unbind(source).is_some() {
            if let Err(e) = self.watcher.unwatch(source) {
                warn!(source = %source.display(), error = %e, "unwatch failed");
            }
        }
        self.announce(&format!("Monitoring stopped for {}", source.display()));
    }

    /// `status <source>`: report the entry's target, last sync time,
    /// and error count.
    fn cmd_status(&mut self, source: &Path) {
        self.journal
            .line(&format!("Status requested for {}", source.display()));

        let Some(entry) = self.registry.get(source).filter(|e| e.active).cloned() else {
            self.console.send(&format!(
                "{} Directory not monitored: {}",
                timestamp(),
                source.display()
            ));
            return;
        };

        let last_sync = entry
            .last_sync
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let ts = timestamp();
        self.console
            .send(&format!("{ts} Status requested for {}", source.display()));
        self.console
            .send(&format!("{ts} Directory: {}", source.display()));
        self.console
            .send(&format!("{ts} Target: {}", entry.target.display()));
        self.console.send(&format!("{ts} Last Sync: {last_sync}"));
        self.console
            .send(&format!("{ts} Errors: {}", entry.error_count));
        self.console.send(&format!("{ts} Status: Active"));
    }

    /// `sync <source>`: force a full sync now, unless one is already
    /// in flight for this source.
    fn cmd_sync(&mut self, source: &Path) {
        let Some(entry) = self.registry.get(source).filter(|e| e.active) else {
            self.announce(&format!("Directory not monitored: {}", source.display()));
            return;
        };
        let target = entry.target.clone();

        if self.scheduler.is_source_busy(source) {
            self.announce(&format!("Sync already in progress {}", source.display()));
            return;
        }

        self.announce(&format!(
            "Syncing directory: {} -> {}",
            source.display(),
            target.display()
        ));
        self.scheduler
            .submit(SyncTask::full(source.to_path_buf(), target), &mut self.journal);
    }

    /// `shutdown`: discard queued tasks, wait for every running worker
    /// to finish and be journaled, then stop the loop. The final
    /// response is not sent until the pool is empty.
    async fn cmd_shutdown(&mut self) {
        self.announce("Shutting down manager...");
        self.announce("Waiting for all active workers to finish.");
        self.announce("Processing remaining queued tasks.");

        let dropped = self.scheduler.discard_queue();
        if dropped > 0 {
            debug!(dropped, "queued tasks discarded at shutdown");
        }

        while self.scheduler.active_count() > 0 {
            match self.exits.recv().await {
                Some(exit) => self.finish_worker(exit, false),
                None => break,
            }
        }

        let stopped: Vec<String> = self
            .registry
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(source, _)| source.display().to_string())
            .collect();
        for source in stopped {
            self.journal.line(&format!("Monitoring stopped for {source}"));
        }
        self.registry.clear();
        self.announce("Manager shutdown complete.");
        self.running = false;
    }

    /// Fold one worker completion into the journal and registry.
    /// `admit` is false during shutdown, when the freed slot must stay
    /// free.
    fn finish_worker(&mut self, exit: WorkerExit, admit: bool) {
        let Some(worker) = self.scheduler.take_finished(exit.pid) else {
            warn!(pid = exit.pid, "completion for unknown worker");
            return;
        };

        let report = Report::parse(&exit.output);
        if let Some(entry) = self.registry.get_mut(&worker.task.source) {
            entry.last_sync = Some(Local::now());
            if report.status == SyncStatus::Error {
                entry.error_count += 1;
            }
        }
        self.journal.worker_finished(&worker.task, worker.pid, &report);

        if admit {
            self.scheduler.admit_next(&mut self.journal);
        }
    }

    /// Turn one raw watcher notification into single-file tasks.
    fn handle_fs_event(&mut self, res: notify::Result<notify::Event>) {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "watch backend error");
                return;
            }
        };

        for change in convert_event(event) {
            // An event on the source directory itself carries no file.
            if self.watch_table.is_bound(&change.path) {
                continue;
            }
            let Some(parent) = change.path.parent() else {
                continue;
            };
            if !self.watch_table.is_bound(parent) {
                warn!(path = %change.path.display(), "event from unwatched directory");
                continue;
            }
            let Some(entry) = self.registry.get(parent).filter(|e| e.active) else {
                continue;
            };
            let Some(name) = change.path.file_name() else {
                continue;
            };

            let task = SyncTask::for_file(
                parent.to_path_buf(),
                entry.target.clone(),
                name.to_string_lossy().into_owned(),
                change.operation,
            );
            self.scheduler.submit(task, &mut self.journal);
        }
    }
}
