//! Remote command - runs the build pipeline on a build host.

use anyhow::{bail, Result};

use bootpack::config::Config;
use bootpack::remote::pipeline::{remote_build_sequence, run_remote, RemoteBuildError};
use bootpack::remote::{ConsoleSink, LocalShell, OpenSsh, RemoteTarget, RunOutcome};
use bootpack::timing::Timer;

pub const USAGE: &str = "Usage: bootpack remote <path> <user> [password]";

/// Options that don't come from the positional arguments.
pub struct RemoteOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Run through a local shell instead of ssh.
    pub local: bool,
}

/// Execute the remote command.
///
/// `args` is `<path> <user> [password]`. Any other count prints usage and
/// does nothing. A failed connection ends the process with status 1.
pub fn cmd_remote(args: &[String], options: RemoteOptions, config: &Config) -> Result<()> {
    let (path, user, password) = match args {
        [path, user] => (path, user, None),
        [path, user, password] => (path, user, Some(password.clone())),
        _ => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let host = options.host.unwrap_or_else(|| config.remote_host.clone());
    let target = RemoteTarget::new(host, user.as_str())
        .with_password(password)
        .with_port(options.port);
    let sequence = remote_build_sequence(path, &config.remote_bin);

    println!("=== Remote Build on {} ===\n", target);
    let timer = Timer::start("remote build");

    let mut sink = ConsoleSink;
    let result = if options.local {
        run_remote(&LocalShell::new(), target, &sequence, &mut sink)
    } else {
        run_remote(&OpenSsh::new(), target, &sequence, &mut sink)
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(RemoteBuildError::Connect(e)) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(RemoteBuildError::Run(e)) => return Err(e),
    };
    timer.finish();

    match outcome {
        RunOutcome::Success => {
            println!("\n=== Remote Build Complete ===");
            Ok(())
        }
        RunOutcome::RemoteFailure { code } => {
            bail!("Remote build failed with exit code {}", code)
        }
        RunOutcome::ConnectionLost => {
            bail!("Connection lost before the remote build reported a status")
        }
    }
}
