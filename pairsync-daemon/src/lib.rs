//! Directory pair synchronization daemon.
//!
//! `pairsyncd` monitors configured source directories and mirrors
//! file-level changes into their targets by spawning one worker
//! process per task. Commands arrive over a named pipe; responses and
//! a persistent journal record everything the daemon does.

pub mod commands;
pub mod config;
pub mod console;
pub mod errors;
pub mod journal;
pub mod manager;
pub mod scheduler;
pub mod watch_table;
pub mod watcher;

pub use config::DaemonArgs;
pub use errors::{DaemonError, Result};
pub use manager::{Manager, ManagerSettings};
