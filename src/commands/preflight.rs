//! Preflight command - reports which build stages can run.

use anyhow::Result;

use bootpack::config::Config;
use bootpack::preflight;

/// Execute the preflight command. `strict` turns a blocked stage into an error.
pub fn cmd_preflight(config: &Config, strict: bool) -> Result<()> {
    if strict {
        return preflight::run_preflight_or_fail(config);
    }

    let report = preflight::run_preflight(config);
    report.print();
    if !report.is_ready() {
        println!("\nRe-run with --strict to turn blocked stages into an error.");
    }
    Ok(())
}
