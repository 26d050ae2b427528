//! Interactive console for the daemon.
//!
//! Connects to the daemon's two named pipes, forwards one command per
//! line, and prints whatever responses arrive within the response
//! window. Every command issued is appended to a local console log.

use std::io::Write as _;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::time::timeout;

/// How long to wait for the daemon to create its pipes.
const PIPE_WAIT_ATTEMPTS: u32 = 50;
const PIPE_WAIT_STEP: Duration = Duration::from_millis(100);

/// How long a command may take to produce its first response line.
const RESPONSE_WINDOW: Duration = Duration::from_secs(5);
/// How long to keep reading once responses have started.
const RESPONSE_DRAIN: Duration = Duration::from_millis(300);

#[derive(Debug, Parser)]
#[command(name = "pairsync")]
#[command(about = "Console for the pairsync daemon", long_about = None)]
#[command(version)]
struct ConsoleArgs {
    /// File every issued command is appended to
    #[arg(short = 'l', long, default_value = "pairsync-console.log")]
    log: PathBuf,

    /// Command pipe of the daemon
    #[arg(long, default_value = "pairsync.in")]
    pipe_in: PathBuf,

    /// Response pipe of the daemon
    #[arg(long, default_value = "pairsync.out")]
    pipe_out: PathBuf,
}

/// Poll until `path` exists and is a pipe. The daemon creates both
/// pipes at startup, so a short wait covers racing it.
async fn wait_for_fifo(path: &Path) -> anyhow::Result<()> {
    for _ in 0..PIPE_WAIT_ATTEMPTS {
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.file_type().is_fifo() {
                return Ok(());
            }
            bail!("{} exists but is not a pipe", path.display());
        }
        tokio::time::sleep(PIPE_WAIT_STEP).await;
    }
    bail!("daemon pipe {} never appeared, is pairsyncd running?", path.display());
}

struct Responses {
    pipe: pipe::Receiver,
    buf: Vec<u8>,
}

impl Responses {
    /// Read one response line, or `None` when `window` elapses first.
    async fn next_line(&mut self, window: Duration) -> anyhow::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                return Ok(Some(String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned()));
            }
            match timeout(window, self.pipe.readable()).await {
                Ok(ready) => ready?,
                Err(_) => return Ok(None),
            }
            let mut chunk = [0u8; 4096];
            match self.pipe.try_read(&mut chunk) {
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  add <source> <target>   start monitoring a directory pair");
    println!("  cancel <source>         stop monitoring a source");
    println!("  status <source>         show the state of a source");
    println!("  sync <source>           force a full sync now");
    println!("  shutdown                stop the daemon");
    println!("  help                    show this help");
    println!("  exit                    leave the console");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ConsoleArgs::parse();

    wait_for_fifo(&args.pipe_in).await?;
    wait_for_fifo(&args.pipe_out).await?;

    let commands = pipe::OpenOptions::new()
        .open_sender(&args.pipe_in)
        .with_context(|| format!("opening command pipe {}", args.pipe_in.display()))?;
    // read_write keeps the descriptor usable while the daemon has not
    // attached its sending side yet.
    let responses = pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(&args.pipe_out)
        .with_context(|| format!("opening response pipe {}", args.pipe_out.display()))?;
    let mut responses = Responses {
        pipe: responses,
        buf: Vec::new(),
    };

    let mut command_log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log)
        .with_context(|| format!("opening console log {}", args.log.display()))?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            print_help();
            continue;
        }
        if line == "exit" {
            break;
        }

        let stamp = Local::now().format("[%Y-%m-%d %H:%M:%S]");
        writeln!(command_log, "{stamp} Command {line}")?;
        command_log.flush()?;

        let mut payload = line.clone().into_bytes();
        payload.push(b'\n');
        commands
            .try_write(&payload)
            .context("daemon command pipe is gone")?;

        let shutting_down = line == "shutdown";
        let mut window = RESPONSE_WINDOW;
        while let Some(response) = responses.next_line(window).await? {
            println!("{response}");
            if shutting_down && response.ends_with("Manager shutdown complete.") {
                return Ok(());
            }
            // The shutdown handshake can outlast the normal drain
            // window while workers finish.
            if !shutting_down {
                window = RESPONSE_DRAIN;
            }
        }
        if shutting_down {
            println!("daemon stopped responding before completing shutdown");
            return Ok(());
        }
    }

    Ok(())
}
