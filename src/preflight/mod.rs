//! Preflight checks for bootpack.
//!
//! Each check is tied to the build stage it gates, so a missing ISO tool
//! blocks `build image` without claiming `build initrd` will fail too.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use crate::config::Config;

pub use types::{Check, PreflightReport, Severity, Stage};

/// Run every check against `config`.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = host_tools::check_host_tools(config);
    checks.extend(environment::check_build_environment(config));
    tracing::debug!(count = checks.len(), "preflight checks run");
    PreflightReport::new(checks)
}

/// Print the report and fail if any stage is blocked.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    if !report.is_ready() {
        let subjects: Vec<String> = report
            .blocking()
            .map(|c| format!("{} ({})", c.subject, c.stage))
            .collect();
        bail!("Preflight blocked by: {}", subjects.join(", "));
    }

    Ok(())
}
