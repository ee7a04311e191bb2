//! Remote build orchestration.
//!
//! A [`Session`] is one authenticated connection to a build host. It runs
//! [`CommandSequence`]s as single shell invocations and streams their output
//! live through a [`Drainer`] into an [`OutputSink`].
//!
//! # Lifecycle
//!
//! ```text
//! connect (one authentication attempt) -> run* -> close
//! ```
//!
//! A connect failure is reported as a [`SessionError`] and is meant to end the
//! process; there is no retry. A session runs one sequence at a time and is
//! unusable after `close`.
//!
//! # Known gaps
//!
//! There is no timeout on a running sequence and no way to cancel it: a hung
//! remote command hangs the session.

pub mod channel;
pub mod drain;
pub mod local;
pub mod pipeline;
pub mod sequence;
pub mod ssh;

use anyhow::{anyhow, Result};
use std::fmt;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub use channel::{Channel, ProcessChannel, Stream};
pub use drain::{CaptureSink, ConsoleSink, Drainer, OutputSink};
pub use local::LocalShell;
pub use sequence::CommandSequence;
pub use ssh::OpenSsh;

/// Sleep between polls when a pass drained nothing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive empty passes after exit before open streams are abandoned.
pub const DRAIN_GRACE_PASSES: u32 = 20;

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub port: Option<u16>,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: None,
            port: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// `user@host` as understood by ssh.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.destination(), port),
            None => f.write_str(&self.destination()),
        }
    }
}

/// Why a session could not be established.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Authentication failed when connecting to {host}: {detail}")]
    Authentication { host: String, detail: String },

    #[error("Could not connect to {host}: {detail}")]
    Connection { host: String, detail: String },

    #[error("'{tool}' is required {purpose} but was not found in PATH")]
    MissingTool {
        tool: &'static str,
        purpose: &'static str,
    },
}

/// How a command sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit status 0 and all output drained.
    Success,
    /// The remote shell exited with a non-zero status.
    RemoteFailure { code: i32 },
    /// The transport died before the command reported a status.
    ConnectionLost,
}

impl RunOutcome {
    /// Plain exit-code interpretation: 0 succeeds, no code means the
    /// command never reported one.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => RunOutcome::Success,
            Some(code) => RunOutcome::RemoteFailure { code },
            None => RunOutcome::ConnectionLost,
        }
    }
}

/// An open connection that can execute commands.
pub trait Transport {
    type Channel: Channel;

    /// Start `command` as one shell invocation.
    fn exec(&mut self, command: &str) -> Result<Self::Channel>;

    /// Map the invocation's exit code to an outcome.
    fn interpret_exit(&self, code: Option<i32>) -> RunOutcome {
        RunOutcome::from_exit_code(code)
    }

    fn close(&mut self) -> Result<()>;
}

/// Establishes transports. Makes exactly one authentication attempt.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, target: &RemoteTarget) -> Result<Self::Transport, SessionError>;
}

pub struct Session<T: Transport> {
    target: RemoteTarget,
    transport: Option<T>,
    poll_interval: Duration,
}

impl<T: Transport> Session<T> {
    pub fn connect<C>(connector: &C, target: RemoteTarget) -> Result<Self, SessionError>
    where
        C: Connector<Transport = T>,
    {
        tracing::debug!(remote = %target, "connecting");
        let transport = connector.connect(&target)?;
        Ok(Self {
            target,
            transport: Some(transport),
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Run a sequence as one invocation and stream its output into `sink`.
    ///
    /// Returns once the exit status is known and both streams are drained,
    /// or have stayed silent for [`DRAIN_GRACE_PASSES`] polls after exit.
    pub fn run(&mut self, sequence: &CommandSequence, sink: &mut dyn OutputSink) -> Result<RunOutcome> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| anyhow!("session to {} is closed", self.target))?;

        let command = sequence.join();
        tracing::debug!(remote = %self.target, %command, "executing");
        let mut channel = transport.exec(&command)?;
        let mut drainer = Drainer::new();

        loop {
            let drained = drainer.drain(&mut channel, sink)?;
            if channel.exit_status_ready()? {
                break;
            }
            if !drained {
                thread::sleep(self.poll_interval);
            }
        }

        // Output written just before exit may still be in flight. A process
        // the sequence left in the background can hold the pipes open
        // indefinitely, so stop after a run of empty passes even without EOF.
        let mut idle_passes = 0;
        loop {
            if drainer.drain(&mut channel, sink)? {
                idle_passes = 0;
                continue;
            }
            if channel.at_eof(Stream::Stdout) && channel.at_eof(Stream::Stderr) {
                break;
            }
            idle_passes += 1;
            if idle_passes >= DRAIN_GRACE_PASSES {
                tracing::debug!(
                    remote = %self.target,
                    "output streams still open after exit; a background process holds them"
                );
                break;
            }
            thread::sleep(self.poll_interval);
        }
        drainer.finish(sink);

        let code = channel.exit_status()?;
        let outcome = transport.interpret_exit(code);
        tracing::debug!(
            ?code,
            ?outcome,
            stdout_bytes = drainer.bytes_moved(Stream::Stdout),
            stderr_bytes = drainer.bytes_moved(Stream::Stderr),
            "sequence finished"
        );
        Ok(outcome)
    }

    /// Close the connection. Further `run` calls fail.
    pub fn close(&mut self) -> Result<()> {
        match self.transport.take() {
            Some(mut transport) => transport.close(),
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(remote = %self.target, "closing session failed: {:#}", e);
        }
    }
}
