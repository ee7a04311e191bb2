//! Show command - displays information.

use anyhow::Result;

use bootpack::config::Config;
use bootpack::initrd::{default_passes, WalkMode};

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the passes `build initrd` would run
    Passes,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Passes => {
            println!("Initrd passes (in order):");
            for (i, pass) in default_passes(config).iter().enumerate() {
                let mode = match pass.mode {
                    WalkMode::Classified => "classified",
                    WalkMode::Subtree => "subtree",
                };
                println!(
                    "  {}. {} -> {} ({})",
                    i + 1,
                    pass.root.display(),
                    pass.prefix,
                    mode
                );
            }
        }
    }
    Ok(())
}
