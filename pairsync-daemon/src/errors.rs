//! Error types for the daemon.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(String),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("control pipe error: {0}")]
    Pipe(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
