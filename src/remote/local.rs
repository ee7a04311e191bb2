//! Local shell transport.
//!
//! Runs sequences with `sh -c` on this machine, with the same channel and
//! outcome semantics as the ssh transport. `bootpack remote --local` uses it
//! to run the build pipeline without a network hop.

use anyhow::Result;

use super::channel::ProcessChannel;
use super::{Connector, RemoteTarget, SessionError, Transport};
use crate::process::Cmd;

pub const DEFAULT_SHELL: &str = "sh";

#[derive(Debug, Clone)]
pub struct LocalShell {
    shell: String,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl LocalShell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connector for LocalShell {
    type Transport = LocalTransport;

    fn connect(&self, target: &RemoteTarget) -> Result<LocalTransport, SessionError> {
        tracing::debug!(remote = %target, "using local shell; credentials ignored");
        Ok(LocalTransport {
            shell: self.shell.clone(),
        })
    }
}

pub struct LocalTransport {
    shell: String,
}

impl Transport for LocalTransport {
    type Channel = ProcessChannel;

    fn exec(&mut self, command: &str) -> Result<ProcessChannel> {
        let child = Cmd::new(&self.shell).arg("-c").arg(command).spawn_piped()?;
        ProcessChannel::new(child)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
