//! OpenSSH-backed transport.
//!
//! `connect` starts one ControlMaster connection (`ssh -M -N -f`) and
//! authenticates exactly once. Every `exec` is a multiplexed client on the
//! master's control socket, so no further authentication happens. `close`
//! asks the master to exit and removes the socket directory.
//!
//! Host keys are trusted on first use and written to known_hosts
//! (`StrictHostKeyChecking=accept-new`); a changed key is refused.
//!
//! A password is handed to `sshpass -e` through the `SSHPASS` environment
//! variable. Without a password, `BatchMode` keeps ssh from prompting.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::channel::ProcessChannel;
use super::{Connector, RemoteTarget, RunOutcome, SessionError, Transport};
use crate::process::{self, Cmd};

pub const SSH: &str = "ssh";
pub const SSHPASS: &str = "sshpass";

/// Exit status ssh uses for its own errors.
pub const SSH_ERROR_EXIT: i32 = 255;

/// sshpass: the password was rejected.
const SSHPASS_BAD_PASSWORD: i32 = 5;

const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Permission denied",
    "Too many authentication failures",
    "Authentication failed",
];

/// Connector that drives the system `ssh` client.
#[derive(Debug, Clone)]
pub struct OpenSsh {
    ssh: String,
    sshpass: String,
}

impl Default for OpenSsh {
    fn default() -> Self {
        Self {
            ssh: SSH.to_string(),
            sshpass: SSHPASS.to_string(),
        }
    }
}

impl OpenSsh {
    pub fn new() -> Self {
        Self::default()
    }

    fn master_command(&self, target: &RemoteTarget, socket: &Path, log: &Path) -> Cmd {
        let cmd = match target.password {
            Some(ref password) => Cmd::new(&self.sshpass)
                .arg("-e")
                .env("SSHPASS", password)
                .arg(&self.ssh)
                .args(["-o", "NumberOfPasswordPrompts=1"]),
            None => Cmd::new(&self.ssh).args(["-o", "BatchMode=yes"]),
        };

        with_port(cmd, target.port)
            .args(["-M", "-N", "-f", "-S"])
            .arg_path(socket)
            .arg("-E")
            .arg_path(log)
            .args([
                "-o",
                "ControlPersist=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ConnectionAttempts=1",
            ])
            .arg(target.destination())
    }
}

fn with_port(cmd: Cmd, port: Option<u16>) -> Cmd {
    match port {
        Some(port) => cmd.arg("-p").arg(port.to_string()),
        None => cmd,
    }
}

impl Connector for OpenSsh {
    type Transport = SshTransport;

    fn connect(&self, target: &RemoteTarget) -> Result<SshTransport, SessionError> {
        if target.password.is_some() && !process::exists(&self.sshpass) {
            return Err(SessionError::MissingTool {
                tool: SSHPASS,
                purpose: "for password authentication",
            });
        }

        let connection_error = |detail: String| SessionError::Connection {
            host: target.host.clone(),
            detail,
        };

        let control_dir = tempfile::Builder::new()
            .prefix("bootpack-ssh-")
            .tempdir()
            .map_err(|e| connection_error(format!("cannot create control directory: {}", e)))?;
        let socket = control_dir.path().join("control");
        let log = control_dir.path().join("master.log");

        let status = self
            .master_command(target, &socket, &log)
            .allow_fail()
            .run_silent()
            .map_err(|e| connection_error(format!("{:#}", e)))?;

        if !status.success() {
            let log_text = fs::read_to_string(&log).unwrap_or_default();
            return Err(classify_connect_failure(
                &target.host,
                status.code(),
                target.password.is_some(),
                &log_text,
            ));
        }

        tracing::debug!(remote = %target, socket = %socket.display(), "control master up");
        Ok(SshTransport {
            ssh: self.ssh.clone(),
            destination: target.destination(),
            port: target.port,
            socket,
            control_dir: Some(control_dir),
        })
    }
}

/// Decide whether a failed master start was an authentication rejection.
pub fn classify_connect_failure(
    host: &str,
    code: Option<i32>,
    via_sshpass: bool,
    log: &str,
) -> SessionError {
    let detail = log
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(code) => format!("ssh exited with code {}", code),
            None => "ssh was terminated by a signal".to_string(),
        });

    let rejected = (via_sshpass && code == Some(SSHPASS_BAD_PASSWORD))
        || AUTH_FAILURE_MARKERS.iter().any(|m| log.contains(m));

    if rejected {
        SessionError::Authentication {
            host: host.to_string(),
            detail,
        }
    } else {
        SessionError::Connection {
            host: host.to_string(),
            detail,
        }
    }
}

/// Live control-master connection.
#[derive(Debug)]
pub struct SshTransport {
    ssh: String,
    destination: String,
    port: Option<u16>,
    socket: PathBuf,
    control_dir: Option<TempDir>,
}

impl SshTransport {
    fn client(&self) -> Cmd {
        let cmd = Cmd::new(&self.ssh).arg("-S").arg_path(&self.socket);
        with_port(cmd, self.port)
    }
}

impl Transport for SshTransport {
    type Channel = ProcessChannel;

    fn exec(&mut self, command: &str) -> Result<ProcessChannel> {
        if self.control_dir.is_none() {
            anyhow::bail!("connection to {} is closed", self.destination);
        }
        let child = self
            .client()
            .args(["-T", "-o", "ControlMaster=no", "-o", "BatchMode=yes"])
            .arg(&self.destination)
            .arg(command)
            .spawn_piped()
            .with_context(|| format!("Failed to start remote command on {}", self.destination))?;
        ProcessChannel::new(child)
    }

    /// ssh reports its own failures (including a dropped connection) as 255.
    fn interpret_exit(&self, code: Option<i32>) -> RunOutcome {
        match code {
            Some(SSH_ERROR_EXIT) | None => RunOutcome::ConnectionLost,
            other => RunOutcome::from_exit_code(other),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(control_dir) = self.control_dir.take() else {
            return Ok(());
        };

        let status = self
            .client()
            .args(["-O", "exit"])
            .arg(&self.destination)
            .allow_fail()
            .run_silent()?;
        if !status.success() {
            tracing::warn!(
                remote = %self.destination,
                "control master did not acknowledge exit (code {:?})",
                status.code()
            );
        }

        control_dir
            .close()
            .context("Failed to remove ssh control directory")
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(remote = %self.destination, "ssh close failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_authentication() {
        let err = classify_connect_failure(
            "build01",
            Some(255),
            false,
            "dev@build01: Permission denied (publickey,password).\n",
        );
        assert!(matches!(err, SessionError::Authentication { .. }));
        assert!(err.to_string().contains("build01"));
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_sshpass_rejection_is_authentication() {
        let err = classify_connect_failure("build01", Some(5), true, "");
        assert!(matches!(err, SessionError::Authentication { .. }));
    }

    #[test]
    fn test_unreachable_host_is_connection_error() {
        let err = classify_connect_failure(
            "nowhere",
            Some(255),
            false,
            "ssh: Could not resolve hostname nowhere: Name or service not known\n",
        );
        match err {
            SessionError::Connection { host, detail } => {
                assert_eq!(host, "nowhere");
                assert!(detail.contains("Could not resolve hostname"));
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_log_falls_back_to_exit_code() {
        let err = classify_connect_failure("h", Some(255), false, "");
        assert!(err.to_string().contains("exit"));
        assert!(err.to_string().contains("255"));
    }

    #[test]
    fn test_ssh_error_exit_means_connection_lost() {
        let transport = SshTransport {
            ssh: SSH.to_string(),
            destination: "dev@h".to_string(),
            port: None,
            socket: PathBuf::from("/nonexistent/control"),
            control_dir: None,
        };
        assert_eq!(transport.interpret_exit(Some(255)), RunOutcome::ConnectionLost);
        assert_eq!(transport.interpret_exit(None), RunOutcome::ConnectionLost);
        assert_eq!(transport.interpret_exit(Some(0)), RunOutcome::Success);
        assert_eq!(
            transport.interpret_exit(Some(2)),
            RunOutcome::RemoteFailure { code: 2 }
        );
    }

    #[test]
    fn test_missing_sshpass_is_reported_before_connecting() {
        let connector = OpenSsh {
            ssh: SSH.to_string(),
            sshpass: "nonexistent_sshpass_12345".to_string(),
        };
        let target = RemoteTarget::new("h", "dev").with_password(Some("secret".into()));
        let err = connector.connect(&target).unwrap_err();
        assert!(matches!(err, SessionError::MissingTool { tool: "sshpass", .. }));
    }
}
