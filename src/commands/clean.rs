//! Clean command - removes build outputs.

use anyhow::Result;

use bootpack::common::remove_tree;
use bootpack::config::Config;

/// Remove the output directory (initrd, image, dumps, leftover staging).
///
/// The build tree is never touched; it belongs to the kernel build.
pub fn cmd_clean(config: &Config) -> Result<()> {
    if !config.output_dir.exists() {
        println!("Nothing to clean ({} does not exist).", config.output_dir.display());
        return Ok(());
    }

    println!("Removing {}...", config.output_dir.display());
    remove_tree(&config.output_dir)?;
    println!("Clean complete.");
    Ok(())
}
