//! Output channels of a running command.
//!
//! A [`Channel`] exposes the same readiness model for every transport: each
//! stream can be asked whether data is ready without blocking, and the exit
//! status can be polled. [`ProcessChannel`] implements it for a local child
//! process (the `ssh` client or `sh`), with one reader thread per pipe.

use anyhow::{Context, Result};
use std::io::{self, Read};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use super::drain::CHUNK_SIZE;

/// Which output stream of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

pub trait Channel {
    /// True if `recv` on this stream would return data without blocking.
    fn ready(&mut self, stream: Stream) -> bool;

    /// Read up to `buf.len()` available bytes. Returns 0 if nothing is
    /// available right now; that does not mean the stream is closed.
    fn recv(&mut self, stream: Stream, buf: &mut [u8]) -> io::Result<usize>;

    /// True once no more data will ever arrive on this stream.
    fn at_eof(&mut self, stream: Stream) -> bool;

    /// True once the command's exit status is known.
    fn exit_status_ready(&mut self) -> io::Result<bool>;

    /// Exit code of the command, waiting for it if necessary. `None` when the
    /// command produced no code (killed by a signal).
    fn exit_status(&mut self) -> io::Result<Option<i32>>;
}

/// Chunks from one pipe, filled by a background reader thread.
struct PipeQueue {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
    closed: bool,
}

impl PipeQueue {
    fn spawn<R: Read + Send + 'static>(mut reader: R, name: &'static str) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; CHUNK_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::warn!(stream = name, "pipe read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
            closed: false,
        }
    }

    fn ready(&mut self) -> bool {
        if self.offset < self.pending.len() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(chunk) => {
                self.pending = chunk;
                self.offset = 0;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                false
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> usize {
        if !self.ready() {
            return 0;
        }
        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        n
    }

    fn at_eof(&mut self) -> bool {
        !self.ready() && self.closed
    }
}

/// Channel over a spawned child with piped stdout and stderr.
pub struct ProcessChannel {
    child: Child,
    stdout: PipeQueue,
    stderr: PipeQueue,
    status: Option<ExitStatus>,
}

impl ProcessChannel {
    pub fn new(mut child: Child) -> Result<Self> {
        let stdout = child.stdout.take().context("child stdout is not piped")?;
        let stderr = child.stderr.take().context("child stderr is not piped")?;
        Ok(Self {
            child,
            stdout: PipeQueue::spawn(stdout, "stdout"),
            stderr: PipeQueue::spawn(stderr, "stderr"),
            status: None,
        })
    }

    fn queue(&mut self, stream: Stream) -> &mut PipeQueue {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }
}

impl Channel for ProcessChannel {
    fn ready(&mut self, stream: Stream) -> bool {
        self.queue(stream).ready()
    }

    fn recv(&mut self, stream: Stream, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.queue(stream).recv(buf))
    }

    fn at_eof(&mut self, stream: Stream) -> bool {
        self.queue(stream).at_eof()
    }

    fn exit_status_ready(&mut self) -> io::Result<bool> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status.is_some())
    }

    fn exit_status(&mut self) -> io::Result<Option<i32>> {
        let status = match self.status {
            Some(status) => status,
            None => {
                let status = self.child.wait()?;
                self.status = Some(status);
                status
            }
        };
        Ok(status.code())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Cmd;
    use std::time::{Duration, Instant};

    fn spawn(script: &str) -> ProcessChannel {
        let child = Cmd::new("sh").args(["-c", script]).spawn_piped().unwrap();
        ProcessChannel::new(child).unwrap()
    }

    fn read_all(channel: &mut ProcessChannel, stream: Stream) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while !channel.at_eof(stream) {
            assert!(Instant::now() < deadline, "stream never reached EOF");
            let n = channel.recv(stream, &mut buf).unwrap();
            if n == 0 {
                thread::sleep(Duration::from_millis(5));
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_streams_are_separated() {
        let mut channel = spawn("printf out; printf err >&2");
        assert_eq!(read_all(&mut channel, Stream::Stdout), b"out");
        assert_eq!(read_all(&mut channel, Stream::Stderr), b"err");
        assert_eq!(channel.exit_status().unwrap(), Some(0));
    }

    #[test]
    fn test_exit_code_is_reported() {
        let mut channel = spawn("exit 3");
        assert_eq!(channel.exit_status().unwrap(), Some(3));
        assert!(channel.exit_status_ready().unwrap());
    }

    #[test]
    fn test_recv_without_data_returns_zero() {
        let mut channel = spawn("sleep 1");
        let mut buf = [0u8; 16];
        assert_eq!(channel.recv(Stream::Stdout, &mut buf).unwrap(), 0);
        assert!(!channel.at_eof(Stream::Stdout));
    }
}
