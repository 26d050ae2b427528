//! The worker pool: a bounded set of running worker processes plus an
//! unbounded FIFO overflow queue.
//!
//! Two hard invariants live here: at most one in-flight worker per
//! source directory, and never more than `limit` workers at once. A
//! task submitted for a busy source is dropped outright rather than
//! queued, and each completion admits at most one queued task.
//!
//! Completions arrive over a dedicated channel: every spawned worker
//! gets a supervising task that drains its stdout to EOF, reaps the
//! process, and sends a [`WorkerExit`]. The control loop folds that
//! channel into its readiness wait, so all scheduler state is mutated
//! from a single thread.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pairsync_proto::SyncTask;

use crate::journal::Journal;

/// Delivered once a worker has exited and its output stream has been
/// read to completion.
#[derive(Debug)]
pub struct WorkerExit {
    pub pid: u32,
    pub output: Vec<u8>,
}

/// Bookkeeping for one running worker process.
#[derive(Debug)]
pub struct ActiveWorker {
    pub pid: u32,
    pub task: SyncTask,
}

pub struct Scheduler {
    worker_bin: PathBuf,
    limit: usize,
    active: Vec<ActiveWorker>,
    queue: VecDeque<SyncTask>,
    exits_tx: mpsc::UnboundedSender<WorkerExit>,
}

impl Scheduler {
    /// Returns the scheduler and the receiving end of its completion
    /// channel, which the control loop must service.
    pub fn new(worker_bin: PathBuf, limit: usize) -> (Self, mpsc::UnboundedReceiver<WorkerExit>) {
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        (
            Scheduler {
                worker_bin,
                limit: limit.max(1),
                active: Vec::new(),
                queue: VecDeque::new(),
                exits_tx,
            },
            exits_rx,
        )
    }

    pub fn is_source_busy(&self, source: &Path) -> bool {
        self.active.iter().any(|w| w.task.source == source)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Dedup and capacity gate. A task for a source with a worker in
    /// flight is dropped; over the limit it is queued in FIFO order.
    pub fn submit(&mut self, task: SyncTask, journal: &mut Journal) {
        if self.is_source_busy(&task.source) {
            debug!(source = %task.source.display(), operation = %task.operation,
                   "dropping task: sync already in flight for source");
            return;
        }
        if self.active.len() >= self.limit {
            journal.task_queued(&task);
            self.queue.push_back(task);
            return;
        }
        self.spawn(task, journal);
    }

    /// Start a worker process for `task`. A failed spawn abandons the
    /// task: it is journaled and the daemon carries on.
    fn spawn(&mut self, task: SyncTask, journal: &mut Journal) {
        let [source, target, file, operation] = task.to_args();
        let mut child = match Command::new(&self.worker_bin)
            .arg(source)
            .arg(target)
            .arg(file)
            .arg(operation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(worker = %self.worker_bin.display(), error = %e, "worker spawn failed");
                journal.line(&format!(
                    "Worker spawn failed for {} -> {} ({} {}): {e}",
                    task.source.display(),
                    task.target.display(),
                    task.operation,
                    task.file,
                ));
                return;
            }
        };

        // id() is Some until the child has been reaped, which only the
        // supervising task below does.
        let pid = child.id().unwrap_or(0);
        let stdout = child.stdout.take();
        let exits = self.exits_tx.clone();
        tokio::spawn(async move {
            let mut output = Vec::new();
            if let Some(mut pipe) = stdout {
                // EOF doubles as end-of-report; read errors just
                // truncate the output and degrade the parse.
                let _ = pipe.read_to_end(&mut output).await;
            }
            let _ = child.wait().await;
            let _ = exits.send(WorkerExit { pid, output });
        });

        journal.worker_started(&task, pid);
        self.active.push(ActiveWorker { pid, task });
    }

    /// Remove and return the active worker matching a completion.
    pub fn take_finished(&mut self, pid: u32) -> Option<ActiveWorker> {
        let idx = self.active.iter().position(|w| w.pid == pid)?;
        Some(self.active.swap_remove(idx))
    }

    /// Admit the FIFO head now that a completion freed a slot. One
    /// completion admits at most one task; if the head's source became
    /// busy in the meantime the dedup check drops it.
    pub fn admit_next(&mut self, journal: &mut Journal) {
        if self.active.len() >= self.limit {
            return;
        }
        if let Some(task) = self.queue.pop_front() {
            self.submit(task, journal);
        }
    }

    /// Throw away every queued task; used by shutdown.
    pub fn discard_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
