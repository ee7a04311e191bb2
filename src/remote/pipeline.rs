//! The remote build pipeline: configure, compile, pack, assemble.

use thiserror::Error;

use super::sequence::{shell_quote, CommandSequence};
use super::{Connector, OutputSink, RemoteTarget, RunOutcome, Session, SessionError};

/// Build directory created inside the remote checkout.
pub const REMOTE_BUILD_DIR: &str = "build";

#[derive(Debug, Error)]
pub enum RemoteBuildError {
    /// The session never came up. Callers treat this as fatal.
    #[error(transparent)]
    Connect(#[from] SessionError),

    /// The session came up but running the sequence failed locally.
    #[error(transparent)]
    Run(#[from] anyhow::Error),
}

/// Fragments that build and package the checkout at `remote_path`.
///
/// Setup steps run unchecked; every step after them aborts the run with its
/// own exit status. `remote_bin` is the bootpack executable on the remote
/// host, run from the build directory against the checkout root.
pub fn remote_build_sequence(remote_path: &str, remote_bin: &str) -> CommandSequence {
    let bootpack = format!("{} --base-dir ..", shell_quote(remote_bin));

    let mut sequence = CommandSequence::new();
    sequence
        .push(format!("cd {}", shell_quote(remote_path)))
        .push(format!("mkdir -p {}", REMOTE_BUILD_DIR))
        .push(format!("cd ./{}", REMOTE_BUILD_DIR))
        .push_checked("bash -e ./../scripts/cmake.sh")
        .push_checked("make")
        .push_checked(format!("{} build initrd", bootpack))
        .push_checked(format!("{} build image", bootpack));
    sequence
}

/// Connect, run `sequence` once, and close.
///
/// The session is closed whether or not the run succeeded.
pub fn run_remote<C: Connector>(
    connector: &C,
    target: RemoteTarget,
    sequence: &CommandSequence,
    sink: &mut dyn OutputSink,
) -> Result<RunOutcome, RemoteBuildError> {
    let mut session = Session::connect(connector, target)?;

    let result = session.run(sequence, sink);
    if let Err(e) = session.close() {
        tracing::warn!(remote = %session.target(), "closing session failed: {:#}", e);
    }

    Ok(result?)
}
