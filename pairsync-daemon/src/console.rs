//! The console channel: two named pipes on the filesystem.
//!
//! The inbound pipe carries newline-delimited commands and is opened
//! read-write at startup, which keeps the descriptor readable even
//! while no client holds the write end. The outbound pipe can only be
//! opened once a reader exists, so opening it is retried from the
//! control loop's tick; until then responses are dropped.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tokio::net::unix::pipe;
use tracing::{debug, warn};

use crate::errors::{DaemonError, Result};

fn make_fifo(path: &Path) -> Result<()> {
    // Recreate from scratch so a stale regular file cannot shadow the
    // pipe.
    let _ = std::fs::remove_file(path);
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| DaemonError::Pipe(format!("bad pipe path: {}", path.display())))?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o666) };
    if rc != 0 {
        return Err(DaemonError::Pipe(format!(
            "mkfifo {} failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

pub struct Console {
    in_path: PathBuf,
    out_path: PathBuf,
    in_pipe: pipe::Receiver,
    out_pipe: Option<pipe::Sender>,
    buf: Vec<u8>,
}

impl Console {
    /// Create both pipes and open the command side. Fatal at startup.
    pub fn create(in_path: &Path, out_path: &Path) -> Result<Self> {
        make_fifo(in_path)?;
        make_fifo(out_path)?;

        let in_pipe = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(in_path)?;

        Ok(Console {
            in_path: in_path.to_path_buf(),
            out_path: out_path.to_path_buf(),
            in_pipe,
            out_pipe: None,
            buf: Vec::new(),
        })
    }

    /// Wait for command bytes and return the complete lines received
    /// so far. A partial trailing line stays buffered. Cancel-safe:
    /// waiting happens before any byte is consumed.
    pub async fn next_commands(&mut self) -> Result<Vec<String>> {
        loop {
            self.in_pipe.readable().await?;
            let mut chunk = [0u8; 4096];
            match self.in_pipe.try_read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    let lines = self.split_lines();
                    if !lines.is_empty() {
                        return Ok(lines);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn split_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                .trim()
                .to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Try to attach the response side. A pipe with no reader refuses
    /// the open; that is not an error, just try again later.
    pub fn connect_output(&mut self) {
        if self.out_pipe.is_some() {
            return;
        }
        if let Ok(sender) = pipe::OpenOptions::new().open_sender(&self.out_path) {
            debug!(pipe = %self.out_path.display(), "response pipe connected");
            self.out_pipe = Some(sender);
        }
    }

    /// Best-effort response delivery. If the reader went away the
    /// sender is dropped so the next tick can reconnect.
    pub fn send(&mut self, line: &str) {
        self.connect_output();
        let Some(pipe) = self.out_pipe.as_ref() else {
            debug!(response = line, "no console attached, response dropped");
            return;
        };
        let mut payload = line.as_bytes().to_vec();
        payload.push(b'\n');
        if let Err(e) = pipe.try_write(&payload) {
            warn!(error = %e, "response write failed, detaching console");
            self.out_pipe = None;
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.in_path);
        let _ = std::fs::remove_file(&self.out_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::FileTypeExt;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn create_places_two_fifos() {
        let dir = tempdir().unwrap();
        let in_path = dir.path().join("cmd.in");
        let out_path = dir.path().join("cmd.out");

        let console = Console::create(&in_path, &out_path).unwrap();
        for path in [&in_path, &out_path] {
            let meta = std::fs::metadata(path).unwrap();
            assert!(meta.file_type().is_fifo());
        }

        drop(console);
        assert!(!in_path.exists());
        assert!(!out_path.exists());
    }

    #[tokio::test]
    async fn commands_arrive_line_by_line() {
        let dir = tempdir().unwrap();
        let in_path = dir.path().join("cmd.in");
        let out_path = dir.path().join("cmd.out");
        let mut console = Console::create(&in_path, &out_path).unwrap();

        // The daemon holds the read end, so a plain write-open works.
        let mut writer = std::fs::OpenOptions::new()
            .write(true)
            .open(&in_path)
            .unwrap();
        writer.write_all(b"status /a\nsync /b\npartial").unwrap();

        let lines = timeout(Duration::from_secs(5), console.next_commands())
            .await
            .expect("commands arrive")
            .unwrap();
        assert_eq!(lines, vec!["status /a".to_string(), "sync /b".to_string()]);

        writer.write_all(b" line\n").unwrap();
        let lines = timeout(Duration::from_secs(5), console.next_commands())
            .await
            .expect("tail arrives")
            .unwrap();
        assert_eq!(lines, vec!["partial line".to_string()]);
    }

    #[tokio::test]
    async fn responses_without_a_reader_are_dropped() {
        let dir = tempdir().unwrap();
        let mut console =
            Console::create(&dir.path().join("cmd.in"), &dir.path().join("cmd.out")).unwrap();

        // No reader on the response pipe; must not block or error.
        console.send("nobody listening");
        assert!(console.out_pipe.is_none());
    }

    #[tokio::test]
    async fn responses_reach_an_attached_reader() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("cmd.out");
        let mut console = Console::create(&dir.path().join("cmd.in"), &out_path).unwrap();

        let mut reader = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&out_path)
            .unwrap();
        console.send("hello");

        let mut buf = [0u8; 64];
        reader.readable().await.unwrap();
        let n = reader.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello\n");
    }
}
